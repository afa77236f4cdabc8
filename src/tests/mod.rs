pub mod support;

mod queue_tests;
