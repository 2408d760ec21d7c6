pub mod send_log;
