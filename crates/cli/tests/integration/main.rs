mod common;

mod archive_tests;
mod install_tests;
mod monit_tests;
mod packages_tests;
mod show_tests;
