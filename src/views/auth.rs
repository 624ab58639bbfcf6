//! Login and registration screen.

use std::sync::Arc;

use super::{Fallback, FormStatus};
use crate::api::auth::{LoginRequest, RegisterRequest};
use crate::api::validation::{validate_email, validate_name, validate_password};
use crate::error::ValidationErrors;
use crate::scope::RequestScope;
use crate::AppContext;

const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const LOGIN_FAILED: &str = "Login failed. Check your credentials.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    /// Only used when registering
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct AuthView {
    ctx: Arc<AppContext>,
    scope: RequestScope,
    pub mode: AuthMode,
    pub form: AuthForm,
    pub status: FormStatus,
}

impl AuthView {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let scope = ctx.scopes.root_scope();
        Self {
            ctx,
            scope,
            mode: AuthMode::default(),
            form: AuthForm::default(),
            status: FormStatus::default(),
        }
    }

    /// The screen renders nothing once someone is logged in
    pub fn is_hidden(&self) -> bool {
        self.ctx.session.is_logged_in()
    }

    /// Switch between login and register, dropping any shown error
    pub fn set_mode(&mut self, mode: AuthMode) {
        self.status.error = None;
        self.mode = mode;
    }

    pub async fn submit(&mut self) -> bool {
        match self.mode {
            AuthMode::Login => self.login().await,
            AuthMode::Register => self.register().await,
        }
    }

    fn validate(&self) -> Result<(), crate::ClientError> {
        let mut errors = ValidationErrors::new();
        if self.mode == AuthMode::Register {
            errors.check("name", validate_name(&self.form.name));
        }
        errors.check("email", validate_email(&self.form.email));
        errors.check("password", validate_password(&self.form.password));
        errors.finish()
    }

    async fn register(&mut self) -> bool {
        if let Err(err) = self.validate() {
            self.status.fail(&err, Fallback::PreferServer(REGISTER_FAILED));
            return false;
        }
        self.status.begin();

        let request = RegisterRequest {
            email: self.form.email.trim().to_string(),
            password: self.form.password.clone(),
            name: self.form.name.trim().to_string(),
        };
        let result = self.scope.run(self.ctx.api.register(&request)).await;

        let session = &self.ctx.session;
        let ok = self.status.settle(
            &self.scope,
            result,
            Fallback::PreferServer(REGISTER_FAILED),
            // Registration yields no credential
            |user| session.set_auth(user, ""),
        );
        if ok {
            self.form = AuthForm::default();
        }
        ok
    }

    async fn login(&mut self) -> bool {
        if let Err(err) = self.validate() {
            self.status.fail(&err, Fallback::PreferServer(LOGIN_FAILED));
            return false;
        }
        self.status.begin();

        let request = LoginRequest {
            email: self.form.email.trim().to_string(),
            password: self.form.password.clone(),
        };
        let result = self.scope.run(self.ctx.api.login(&request)).await;

        let session = &self.ctx.session;
        let ok = self.status.settle(
            &self.scope,
            result,
            Fallback::PreferServer(LOGIN_FAILED),
            |response| session.set_auth(response.user, response.token),
        );
        if ok {
            self.form = AuthForm::default();
        }
        ok
    }
}
