//! # Loader Module
//!
//! Maps class names to script files under the application tree and makes
//! classes available on demand.
//!
//! ## Declared classes
//!
//! Controllers, action classes, plugins and the bootstrap are plain Rust
//! types. The application declares each one together with the script that
//! conventionally holds it:
//!
//! ```rust,ignore
//! app.loader_mut()
//!     .declare_controller("Index", "Index", ControllerClass::of::<IndexController>())
//!     .declare_controller("Admin", "User", ControllerClass::of::<UserController>());
//! ```
//!
//! The class stays invisible until that script is imported, which only
//! succeeds if the file exists. The dispatcher therefore still reports
//! `CONTROLLER_NOT_FOUND` for a missing `controllers/User.php` and
//! `AUTOLOAD_FAILED` for a script that exists but does not hold the class.
//!
//! ## Layout
//!
//! | Class | Script |
//! |---|---|
//! | `Index_Controller` (default module) | `<app>/controllers/Index.<ext>` |
//! | `User_Controller` (module `Admin`) | `<app>/modules/Admin/controllers/User.<ext>` |
//! | `Dummy_Action` of `Index` | `<app>/controllers/Index/dummy.<ext>` |
//! | `Auth_Plugin` | `<app>/plugins/Auth.<ext>` |
//! | `Foo_Bar` | `<local library>/Foo/Bar.<ext>` |
//! | `Ns_Bar` with `Ns` registered | `<global library>/Ns/Bar.<ext>` |

mod core;

pub use core::{
    ClassDef, Loader, LoaderOptions, BOOTSTRAP_CLASS, CONTROLLER_DIRECTORY, LIBRARY_DIRECTORY,
    MODULE_DIRECTORY, PLUGIN_DIRECTORY, VIEW_DIRECTORY,
};
