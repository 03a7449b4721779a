//! State of the single catalog view.
//!
//! One [`ViewState`] exists per browser session. Handlers never assign its
//! fields directly; they describe what happened as an [`Action`] and hand it
//! to [`ViewState::apply`]. Between requests the state lives in the HTTP
//! session.

use serde::{Deserialize, Serialize};

use bangun_rumah_core::{Product, ProductForm, ProductId, Role, filter_by_name};

use crate::backend::AuthUser;

/// Banner severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A one-shot message shown above the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Everything that can happen to the view.
#[derive(Debug, Clone)]
pub enum Action {
    /// A session was established and its role resolved.
    SignedIn { user: AuthUser, role: Role },
    /// The session ended; all user-scoped state is dropped.
    SignedOut,
    /// The catalog was read; replaces the list wholesale.
    ProductsLoaded(Vec<Product>),
    SearchChanged(String),
    FormEdited(ProductForm),
    /// Load a product into the form and make it the edit target.
    EditStarted(Product),
    /// Clear the form and leave edit mode.
    FormReset,
    DeleteRequested(ProductId),
    DeleteCancelled,
    /// Email retained in the login form after a failed attempt.
    LoginEmailChanged(String),
    Notify(Notice),
    /// The current notice has been rendered once.
    NoticeShown,
}

/// The single view's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub current_user: Option<AuthUser>,
    pub role: Option<Role>,
    pub products: Vec<Product>,
    pub form: ProductForm,
    pub edit_target: Option<ProductId>,
    pub pending_delete: Option<ProductId>,
    pub search: String,
    pub login_email: String,
    pub notice: Option<Notice>,
}

impl ViewState {
    /// Apply one transition.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SignedIn { user, role } => {
                self.current_user = Some(user);
                self.role = Some(role);
                self.login_email.clear();
            }
            Action::SignedOut => {
                let notice = self.notice.take();
                *self = Self {
                    notice,
                    ..Self::default()
                };
            }
            Action::ProductsLoaded(products) => {
                self.products = products;
                let still_listed = self
                    .pending_delete
                    .as_ref()
                    .is_some_and(|id| self.products.iter().any(|p| &p.id == id));
                if !still_listed {
                    self.pending_delete = None;
                }
            }
            Action::SearchChanged(search) => self.search = search,
            Action::FormEdited(form) => self.form = form,
            Action::EditStarted(product) => {
                self.form = ProductForm::from_product(&product);
                self.edit_target = Some(product.id);
            }
            Action::FormReset => {
                self.form = ProductForm::default();
                self.edit_target = None;
            }
            Action::DeleteRequested(id) => self.pending_delete = Some(id),
            Action::DeleteCancelled => self.pending_delete = None,
            Action::LoginEmailChanged(email) => self.login_email = email,
            Action::Notify(notice) => self.notice = Some(notice),
            Action::NoticeShown => self.notice = None,
        }
    }

    /// Products whose name contains the search text, ignoring case.
    #[must_use]
    pub fn visible_products(&self) -> Vec<&Product> {
        filter_by_name(&self.products, &self.search)
    }

    /// Whether create, edit, delete and import controls are available.
    #[must_use]
    pub fn can_manage_catalog(&self) -> bool {
        self.current_user.is_some() && self.role.is_some_and(Role::is_admin)
    }

    #[must_use]
    pub const fn is_editing(&self) -> bool {
        self.edit_target.is_some()
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.current_user.is_some()
    }

    /// Product awaiting delete confirmation, if it is still listed.
    #[must_use]
    pub fn pending_delete_product(&self) -> Option<&Product> {
        let id = self.pending_delete.as_ref()?;
        self.products.iter().find(|p| &p.id == id)
    }

    /// Remove and return the notice so it shows only once.
    pub fn take_notice(&mut self) -> Option<Notice> {
        let notice = self.notice.clone();
        self.apply(Action::NoticeShown);
        notice
    }
}
