#![allow(dead_code)]

pub mod embedder;
pub mod signals;
pub mod wav;
