//! Handlebars-backed template engine
//!
//! HTML escaping is disabled since the output is source code, and missing
//! variables render as empty strings. Case helpers are registered for use in
//! templates, e.g. `{{pascal_case name}}`.

use handlebars::{handlebars_helper, no_escape, Handlebars};
use heck::{
    ToKebabCase, ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase,
};
use serde_json::Value;

/// Template engine with case-transform helpers
#[derive(Clone)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

handlebars_helper!(snake_case: |s: str| s.to_snake_case());
handlebars_helper!(kebab_case: |s: str| s.to_kebab_case());
handlebars_helper!(camel_case: |s: str| s.to_lower_camel_case());
handlebars_helper!(pascal_case: |s: str| s.to_pascal_case());
handlebars_helper!(screaming_snake_case: |s: str| s.to_shouty_snake_case());
handlebars_helper!(upper_case: |s: str| s.to_uppercase());
handlebars_helper!(lower_case: |s: str| s.to_lowercase());

impl TemplateEngine {
    /// Create a new template engine
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.set_strict_mode(false);

        registry.register_helper("snake_case", Box::new(snake_case));
        registry.register_helper("kebab_case", Box::new(kebab_case));
        registry.register_helper("camel_case", Box::new(camel_case));
        registry.register_helper("pascal_case", Box::new(pascal_case));
        registry.register_helper("screaming_snake_case", Box::new(screaming_snake_case));
        registry.register_helper("upper_case", Box::new(upper_case));
        registry.register_helper("lower_case", Box::new(lower_case));

        Self { registry }
    }

    /// Render `template` against `context`
    ///
    /// Syntax errors and helper failures are returned as the engine's message.
    pub fn render(&self, template: &str, context: &Value) -> Result<String, String> {
        self.registry
            .render_template(template, context)
            .map_err(|e| e.to_string())
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_variable() {
        let engine = TemplateEngine::new();
        let out = engine.render("# {{name}}", &json!({"name": "Demo"})).unwrap();
        assert_eq!(out, "# Demo");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{ty}}", &json!({"ty": "Vec<&str>"}))
            .unwrap();
        assert_eq!(out, "Vec<&str>");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("[{{missing}}]", &json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_case_helpers() {
        let engine = TemplateEngine::new();
        let ctx = json!({"name": "my shop app"});

        let cases = [
            ("{{snake_case name}}", "my_shop_app"),
            ("{{kebab_case name}}", "my-shop-app"),
            ("{{camel_case name}}", "myShopApp"),
            ("{{pascal_case name}}", "MyShopApp"),
            ("{{screaming_snake_case name}}", "MY_SHOP_APP"),
            ("{{upper_case name}}", "MY SHOP APP"),
            ("{{lower_case name}}", "my shop app"),
        ];
        for (template, expected) in cases {
            assert_eq!(engine.render(template, &ctx).unwrap(), expected, "{}", template);
        }
    }

    #[test]
    fn test_syntax_error_reported() {
        let engine = TemplateEngine::new();
        assert!(engine.render("{{#if x}}unclosed", &json!({})).is_err());
    }

    #[test]
    fn test_conditionals_and_loops() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(
                "{{#if db}}db:{{db}}{{/if}}{{#each deps}} {{this}}{{/each}}",
                &json!({"db": "sqlite", "deps": ["serde", "tokio"]}),
            )
            .unwrap();
        assert_eq!(out, "db:sqlite serde tokio");
    }
}
