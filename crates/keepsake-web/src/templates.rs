//! Page templates, compiled into the binary and rendered with minijinja.

use std::sync::OnceLock;

use minijinja::{Environment, ErrorKind};
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("nav.html", include_str!("../templates/nav.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("experiment_list.html", include_str!("../templates/experiment_list.html")),
    ("experiment.html", include_str!("../templates/experiment.html")),
    ("error.html", include_str!("../templates/error.html")),
];

fn build_environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    for &(name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

/// Shared template environment. Template syntax errors surface on first render.
fn environment() -> &'static Result<Environment<'static>, String> {
    static ENV: OnceLock<Result<Environment<'static>, String>> = OnceLock::new();
    ENV.get_or_init(|| build_environment().map_err(|e| e.to_string()))
}

/// Render a named template with a serializable context.
pub fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, minijinja::Error> {
    let env = environment()
        .as_ref()
        .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.clone()))?;
    env.get_template(name)?.render(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_templates_compile() {
        let env = build_environment().unwrap();
        for &(name, _) in TEMPLATES {
            assert!(env.get_template(name).is_ok(), "template {name} missing");
        }
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = render("error.html", context! { title => "Error", message => "<script>" }).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        assert!(render("missing.html", context! {}).is_err());
    }
}
