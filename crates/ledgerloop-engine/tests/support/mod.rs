#![allow(dead_code)]

pub mod learning_testkit;
