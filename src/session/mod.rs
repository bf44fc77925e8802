pub mod engine;
pub mod connection;
pub mod shell;

pub use engine::{Cursor, EngineConnection, EngineConnector, VecCursor};
pub use connection::{ConnectionManager, Session};
pub use shell::{ImpalaShellConnector, ShellSettings};
