mod lazy_history;
mod rollback;
mod rcs_backend;
mod replace_window;
mod store_maintenance;
