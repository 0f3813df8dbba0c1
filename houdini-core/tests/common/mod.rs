#![allow(dead_code)]

pub mod engine_util;
