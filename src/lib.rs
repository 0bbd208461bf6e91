// Library surface: the test engine and its collaborators, shared by the
// binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod ledger;
pub mod logging;
pub mod result;
pub mod runtime;
pub mod saver;
pub mod session;
pub mod settings;
pub mod stats;
pub mod store;
pub mod text_gen;
pub mod time_series;
pub mod timer;
pub mod ui;
pub mod util;
