#![allow(dead_code)]

pub mod app_tree {
    use serde_json::{json, Value};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A throw-away application directory.
    pub struct AppTree {
        dir: TempDir,
    }

    impl AppTree {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn join(&self, relative: &str) -> PathBuf {
            self.dir.path().join(relative)
        }

        /// Create an empty script file (and its directories).
        pub fn touch(&self, relative: &str) -> &Self {
            self.write(relative, "")
        }

        pub fn write(&self, relative: &str, contents: &str) -> &Self {
            let path = self.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
            self
        }

        /// `{"application": {"directory": <tree>, ..extra}}`
        pub fn config(&self, extra: Value) -> Value {
            let mut app = json!({ "directory": self.path().to_string_lossy() });
            if let (Some(map), Value::Object(extra)) = (app.as_object_mut(), extra) {
                map.extend(extra);
            }
            json!({ "application": app })
        }
    }
}

pub mod lock {
    use parking_lot::{const_mutex, Mutex, MutexGuard};

    static APP_LOCK: Mutex<()> = const_mutex(());

    /// Serializes tests that construct the process-wide `Application`.
    pub fn app_lock() -> MutexGuard<'static, ()> {
        APP_LOCK.lock()
    }
}

pub mod plugins {
    use parking_lot::Mutex;
    use std::sync::Arc;
    use yaf::http::{Request, Response};
    use yaf::plugin::Hook;
    use yaf::{Plugin, Result};

    /// Records every hook it sees, in order.
    #[derive(Default, Clone)]
    pub struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl Recorder {
        fn push(&self, hook: Hook) -> Result<()> {
            self.0.lock().push(hook.name());
            Ok(())
        }

        pub fn events(&self) -> Vec<&'static str> {
            self.0.lock().clone()
        }

        pub fn count(&self, hook: Hook) -> usize {
            self.events().iter().filter(|e| **e == hook.name()).count()
        }
    }

    impl Plugin for Recorder {
        fn router_startup(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::RouterStartup)
        }
        fn router_shutdown(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::RouterShutdown)
        }
        fn dispatch_loop_startup(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::DispatchLoopStartup)
        }
        fn pre_dispatch(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::PreDispatch)
        }
        fn post_dispatch(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::PostDispatch)
        }
        fn dispatch_loop_shutdown(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::DispatchLoopShutdown)
        }
        fn pre_response(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
            self.push(Hook::PreResponse)
        }
    }

    /// Implements no hook at all.
    pub struct Silent;

    impl Plugin for Silent {}

    pub fn full_sequence() -> Vec<&'static str> {
        Hook::ALL.iter().map(|h| h.name()).collect()
    }
}
