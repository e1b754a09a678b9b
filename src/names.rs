//! Naming conventions shared by the dispatcher, the loader and the router.
//!
//! Module and action names are title-cased (`ucfirst(lowercase)`), controller
//! names title-case every `_` separated segment. Class names are derived from
//! the canonical names and the `name_suffix`/`name_separator` settings.

/// Title-case: first char upper, the rest lower. `"hELLO"` → `"Hello"`.
#[must_use]
pub fn title_case(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Title-case each `_` separated segment. `"index_sub"` → `"Index_Sub"`.
#[must_use]
pub fn title_case_segments(name: &str) -> String {
    name.split('_').map(title_case).collect::<Vec<_>>().join("_")
}

/// What a conventional class name designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Controller,
    Action,
    Plugin,
}

impl ClassKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Controller => "Controller",
            ClassKind::Action => "Action",
            ClassKind::Plugin => "Plugin",
        }
    }
}

/// Class name for `name` of `kind`: `Index_Controller` or `Controller_Index`.
#[must_use]
pub fn class_name(kind: ClassKind, name: &str, suffix: bool, separator: &str) -> String {
    if suffix {
        format!("{name}{separator}{}", kind.as_str())
    } else {
        format!("{}{separator}{name}", kind.as_str())
    }
}

/// Default template path: `<controller lowercased, '_' as '/'>/<action>.<ext>`.
#[must_use]
pub fn default_template(controller: &str, action: &str, view_ext: &str) -> String {
    format!(
        "{}/{}.{view_ext}",
        controller.to_lowercase().replace('_', "/"),
        action.to_lowercase()
    )
}
