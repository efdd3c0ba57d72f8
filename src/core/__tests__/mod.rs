pub mod cost_test;
pub mod update_manager_test;
