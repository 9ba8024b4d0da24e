//! HTML page rendering via embedded minijinja templates.

use axum::response::Html;
use minijinja::{Environment, context};

use crate::error::ServerError;
use crate::session::TranscriptEntry;

/// Renders the three pages of the app from templates embedded at compile
/// time.  minijinja's default auto-escaping is active for `.html` template
/// names, so transcript text is HTML-escaped on interpolation.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", include_str!("../templates/index.html"))?;
        env.add_template("login.html", include_str!("../templates/login.html"))?;
        env.add_template(
            "register.html",
            include_str!("../templates/register.html"),
        )?;
        Ok(Self { env })
    }

    /// The chat page: working transcript, or the past-chats listing when
    /// `show_past` is set (which also hides the input form).
    pub fn chat(
        &self,
        messages: &[TranscriptEntry],
        show_past: bool,
    ) -> Result<Html<String>, ServerError> {
        let page = self
            .env
            .get_template("index.html")?
            .render(context! { messages => messages, show_past => show_past })?;
        Ok(Html(page))
    }

    pub fn login(&self, error: Option<&str>) -> Result<Html<String>, ServerError> {
        let page = self
            .env
            .get_template("login.html")?
            .render(context! { error => error })?;
        Ok(Html(page))
    }

    pub fn register(&self, error: Option<&str>) -> Result<Html<String>, ServerError> {
        let page = self
            .env
            .get_template("register.html")?
            .render(context! { error => error })?;
        Ok(Html(page))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chat_page_renders_and_escapes_messages() {
        let pages = Pages::new().unwrap();
        let Html(page) = pages
            .chat(
                &[
                    TranscriptEntry::user("<b>sneaky</b>"),
                    TranscriptEntry::model("ok"),
                ],
                false,
            )
            .unwrap();
        assert!(page.contains("&lt;b&gt;sneaky&lt;/b&gt;"));
        assert!(!page.contains("<b>sneaky</b>"));
        assert!(page.contains("class=\"user\""));
        assert!(page.contains("class=\"ai\""));
        assert!(page.contains("action=\"/chat\""));
    }

    #[test]
    fn past_view_hides_the_input_form() {
        let pages = Pages::new().unwrap();
        let Html(page) = pages.chat(&[], true).unwrap();
        assert!(page.contains("<h2>Past chats</h2>"));
        assert!(!page.contains("enctype=\"multipart/form-data\""));
    }

    #[test]
    fn login_error_is_shown_only_when_present() {
        let pages = Pages::new().unwrap();
        let Html(with_error) = pages.login(Some("Invalid username or password")).unwrap();
        assert!(with_error.contains("Invalid username or password"));

        let Html(without) = pages.login(None).unwrap();
        assert!(!without.contains("class=\"error\""));
    }

    #[test]
    fn register_error_is_shown() {
        let pages = Pages::new().unwrap();
        let Html(page) = pages.register(Some("Username already exists")).unwrap();
        assert!(page.contains("Username already exists"));
    }
}
