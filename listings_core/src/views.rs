//! Server-side views.
//!
//! Templates ship inside the binary. Files of the same name in the configured
//! template directory replace the built-in ones at startup.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, response::Html};
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::auth::UserPrincipal;
use crate::config::TemplateConfig;
use crate::error::Result;
use crate::middleware::auth::CurrentUser;
use crate::session::{FlashMessages, PendingFlash};

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("error.html", include_str!("../templates/error.html")),
    ("users/signup.html", include_str!("../templates/users/signup.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    ("listings/index.html", include_str!("../templates/listings/index.html")),
    ("listings/show.html", include_str!("../templates/listings/show.html")),
    ("listings/new.html", include_str!("../templates/listings/new.html")),
];

pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn builtin() -> Result<Self> {
        Self::from_raw(BUILTIN_TEMPLATES)
    }

    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn new(config: &TemplateConfig) -> Result<Self> {
        if !config.dir.is_dir() {
            debug!(dir = %config.dir.display(), "no template directory, using built-in views");
            return Self::builtin();
        }

        let glob = format!("{}/**/*.html", config.dir.display());
        let mut tera = Tera::parse(&glob)?;
        for name in tera.get_template_names() {
            info!(template = name, dir = %config.dir.display(), "overriding built-in template");
        }

        // Built-ins fill in whatever the directory does not provide.
        tera.extend(&Self::builtin()?.tera)?;
        tera.build_inheritance_chains()?;
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(name, context)?)
    }

    pub fn page(&self, name: &str, context: &Context) -> Result<Html<String>> {
        self.render(name, context).map(Html)
    }
}

/// Values every view receives: the visitor and the flash messages drained for
/// this request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub current_user: Option<UserPrincipal>,
    pub flash: FlashMessages,
}

impl RequestContext {
    pub fn from_extensions(extensions: &axum::http::Extensions) -> Self {
        Self {
            current_user: extensions
                .get::<CurrentUser>()
                .and_then(|user| user.0.clone()),
            flash: extensions
                .get::<PendingFlash>()
                .map(PendingFlash::take)
                .unwrap_or_default(),
        }
    }

    pub fn view(&self) -> Context {
        let mut context = Context::new();
        context.insert("currentUser", &self.current_user);
        context.insert("successMessages", &self.flash.success);
        context.insert("errorMessages", &self.flash.error);
        context
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions))
    }
}
