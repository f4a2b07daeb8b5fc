use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pdf2md_core::translate::{PromptTemplate, DEFAULT_TRANSLATION_PROMPT};

use crate::prelude::*;

/// Name of the translation prompt, looked up as `translate.txt`.
pub const TRANSLATE_PROMPT: &str = "translate";

/// Loads prompt templates from `<dir>/<name>.txt` and keeps them for the
/// life of the process.
#[derive(Debug, Default)]
pub struct PromptManager {
    dir: Option<PathBuf>,
    templates: HashMap<String, PromptTemplate>,
}

impl PromptManager {
    pub fn new(dir: Option<PathBuf>) -> Self {
        PromptManager {
            dir,
            templates: HashMap::new(),
        }
    }

    pub fn prompt_path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_deref().map(|dir| dir.join(f!("{}.txt", name)))
    }

    fn read(&self, name: &str) -> Result<PromptTemplate> {
        let path = self.prompt_path(name).filter(|p| p.is_file());

        let source = match path.as_deref() {
            Some(path) => read_template(path)?,
            None if name == TRANSLATE_PROMPT => DEFAULT_TRANSLATION_PROMPT.to_string(),
            None => return Err(eyre!(Error::PromptNotFound(name.to_string()))),
        };

        PromptTemplate::parse(&source).map_err(|e| eyre!("Invalid prompt '{}': {}", name, e))
    }

    /// The template called `name`, read on first use. The built-in
    /// translation prompt stands in when no file overrides it.
    pub fn load(&mut self, name: &str) -> Result<&PromptTemplate> {
        if !self.templates.contains_key(name) {
            let template = self.read(name)?;
            log::debug!("loaded prompt '{}' ({:?})", name, template.placeholders());
            self.templates.insert(name.to_string(), template);
        }

        self.templates
            .get(name)
            .ok_or_else(|| eyre!(Error::PromptNotFound(name.to_string())))
    }

    /// Render the template called `name`.
    pub fn generate(&mut self, name: &str, replacements: &HashMap<&str, &str>) -> Result<String> {
        self.load(name)?
            .render(replacements)
            .map_err(|e| eyre!("Failed to render prompt '{}': {}", name, e))
    }

    /// Forget cached templates so edited files are picked up.
    pub fn reload(&mut self) {
        self.templates.clear();
    }
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| f!("Failed to read prompt {}", path.display()))
}
