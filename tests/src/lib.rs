#![cfg(test)]

mod discovery;
mod fakes;
mod sessions;
