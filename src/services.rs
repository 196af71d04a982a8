pub mod auth;
pub use auth::AuthService;
pub mod permission_editor;
pub use permission_editor::PermissionEditor;
pub mod snapshot_loader;
pub use snapshot_loader::SnapshotLoader;
