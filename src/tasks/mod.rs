pub mod purge_sessions;
