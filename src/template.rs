use crate::{
    config::Config,
    error::{Error, Result},
    metadata::DocumentMetadata,
};
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

const BUILTIN_TEMPLATE: &str = "front_matter";
const CUSTOM_TEMPLATE: &str = "custom";

/// Values available to the front matter template.
#[derive(Debug, Serialize)]
pub(crate) struct FrontMatter<'a> {
    author: &'a str,
    title: &'a str,
    subtitle: &'a str,
    created: String,
    date: String,
    draft: bool,
    weight: u32,
    tags: &'a [String],
    categories: &'a [String],
}

/// Renders front matter blocks.
pub(crate) struct TemplateEngine {
    tera: Tera,
    template: &'static str,
    author: String,
    draft: bool,
    weight: u32,
}

impl TemplateEngine {
    /// Creates a new template engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in or custom template fails to parse.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();
        // front matter is not HTML
        tera.autoescape_on(Vec::new());

        tera.add_raw_template(
            BUILTIN_TEMPLATE,
            include_str!("../templates/front_matter.tera"),
        )
        .map_err(|e| Error::template(BUILTIN_TEMPLATE, e))?;

        let template = if let Some(ref path) = config.template_path {
            tera.add_template_file(path, Some(CUSTOM_TEMPLATE))
                .map_err(|e| Error::template(path.display().to_string(), e))?;
            CUSTOM_TEMPLATE
        } else {
            BUILTIN_TEMPLATE
        };

        tera.register_filter("flow_list", Self::flow_list_filter);

        Ok(Self {
            tera,
            template,
            author: config.author.clone(),
            draft: config.draft,
            weight: config.weight,
        })
    }

    /// Renders the front matter block for one document.
    ///
    /// The result always ends with exactly one newline.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render(&self, metadata: &DocumentMetadata) -> Result<String> {
        let front_matter = FrontMatter {
            author: &self.author,
            title: &metadata.title,
            subtitle: &metadata.subtitle,
            created: metadata.created.to_rfc3339(),
            date: metadata.updated.to_rfc3339(),
            draft: self.draft,
            weight: self.weight,
            tags: &metadata.tags,
            categories: &metadata.categories,
        };

        let context = Context::from_serialize(&front_matter)
            .map_err(|e| Error::template(self.template, e))?;
        let rendered = self
            .tera
            .render(self.template, &context)
            .map_err(|e| Error::template(self.template, e))?;

        let mut block = rendered.trim_end_matches(['\r', '\n']).to_string();
        block.push('\n');
        Ok(block)
    }

    /// Renders an array of strings as a flow sequence: `["a", "b"]`.
    fn flow_list_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let Some(items) = value.as_array() else {
            return Err(tera::Error::msg("flow_list expects an array"));
        };

        let quoted = items
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| tera::Error::msg(format!("Failed to encode list item: {e}")))?;

        Ok(Value::String(format!("[{}]", quoted.join(", "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use chrono::DateTime;

    fn config(root: &std::path::Path) -> Config {
        Config::builder()
            .root_dir(root)
            .dry_run(true)
            .build()
            .unwrap()
    }

    fn sample() -> DocumentMetadata {
        DocumentMetadata {
            title: "app readme".to_string(),
            subtitle: "An app that does things".to_string(),
            tags: vec!["Acme Corp".to_string(), "NASA".to_string()],
            categories: vec!["app".to_string()],
            created: DateTime::parse_from_rfc3339("2021-03-04T10:11:12+01:00").unwrap(),
            updated: DateTime::parse_from_rfc3339("2022-05-06T07:08:09+00:00").unwrap(),
        }
    }

    #[test]
    fn test_render_builtin_block() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = TemplateEngine::new(&config(temp.path())).unwrap();

        let block = engine.render(&sample()).unwrap();
        assert_eq!(
            block,
            "---\n\
             author: \"sirch\"\n\
             title: \"app readme\"\n\
             subtitle: \"An app that does things\"\n\
             created: 2021-03-04T10:11:12+01:00\n\
             date: 2022-05-06T07:08:09+00:00\n\
             draft: false\n\
             weight: 10\n\
             tags: [\"Acme Corp\", \"NASA\"]\n\
             categories: [\"app\"]\n\
             ---\n"
        );
    }

    #[test]
    fn test_render_empty_lists() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = TemplateEngine::new(&config(temp.path())).unwrap();

        let mut metadata = sample();
        metadata.tags.clear();
        metadata.categories.clear();

        let block = engine.render(&metadata).unwrap();
        assert!(block.contains("tags: []\n"));
        assert!(block.contains("categories: []\n"));
    }

    #[test]
    fn test_render_does_not_escape() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = TemplateEngine::new(&config(temp.path())).unwrap();

        let mut metadata = sample();
        metadata.title = "Q&A <draft>".to_string();

        let block = engine.render(&metadata).unwrap();
        assert!(block.contains("title: \"Q&A <draft>\""));
    }

    #[test]
    fn test_custom_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("front.html");
        template
            .write_str("+++\ntitle = \"{{ title }}\"\ntags = {{ tags | flow_list }}\n+++\n\n\n")
            .unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .dry_run(true)
            .template_path(template.path())
            .author("someone")
            .build()
            .unwrap();
        let engine = TemplateEngine::new(&config).unwrap();

        let block = engine.render(&sample()).unwrap();
        assert_eq!(
            block,
            "+++\ntitle = \"app readme\"\ntags = [\"Acme Corp\", \"NASA\"]\n+++\n"
        );
    }

    #[test]
    fn test_invalid_custom_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("broken.tera");
        template.write_str("{{ title ").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .dry_run(true)
            .template_path(template.path())
            .build()
            .unwrap();

        assert!(matches!(
            TemplateEngine::new(&config),
            Err(Error::Template { .. })
        ));
    }

    #[test]
    fn test_flow_list_escapes_quotes() {
        let value = Value::Array(vec![Value::String("say \"hi\"".to_string())]);
        let rendered = TemplateEngine::flow_list_filter(&value, &HashMap::new()).unwrap();
        assert_eq!(rendered, Value::String(r#"["say \"hi\""]"#.to_string()));
    }
}
