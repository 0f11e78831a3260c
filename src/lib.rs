//! Workspace root. Exists so the workspace-level integration tests in
//! `tests/` have a package to hang off; the real crates are the
//! workspace members.
