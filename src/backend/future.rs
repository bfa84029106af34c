// src/backend/future.rs

//! Background loading of the package database
//!
//! Reading the system database takes seconds on large mirrors. The loader
//! runs on its own thread from construction; callers poll `is_ready()` and
//! block in `wait()` only when they actually need the data.

use crate::error::{Error, Result};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

enum State<D> {
    Loading(JoinHandle<Result<D>>),
    Ready(D),
    Failed(String),
}

/// A database that is loading, loaded, or failed to load
pub struct BackendFuture<D> {
    state: State<D>,
}

impl<D: Send + 'static> BackendFuture<D> {
    /// Start `loader` on a background thread
    pub fn spawn<F>(loader: F) -> Self
    where
        F: FnOnce() -> Result<D> + Send + 'static,
    {
        let state = match thread::Builder::new()
            .name("backend-init".to_string())
            .spawn(loader)
        {
            Ok(handle) => State::Loading(handle),
            Err(e) => State::Failed(format!("could not start loader thread: {}", e)),
        };
        Self { state }
    }

    /// Wrap an already loaded database
    pub fn ready(database: D) -> Self {
        Self {
            state: State::Ready(database),
        }
    }

    /// Non-blocking: has the loader finished (successfully or not)?
    pub fn is_ready(&self) -> bool {
        match &self.state {
            State::Loading(handle) => handle.is_finished(),
            State::Ready(_) | State::Failed(_) => true,
        }
    }

    /// Block until loading completes
    ///
    /// A load failure is sticky: every later call reports the same error.
    pub fn wait(&mut self) -> Result<()> {
        if let State::Loading(_) = self.state {
            let previous = std::mem::replace(&mut self.state, State::Failed(String::new()));
            if let State::Loading(handle) = previous {
                self.state = match handle.join() {
                    Ok(Ok(database)) => {
                        debug!("Package database loaded");
                        State::Ready(database)
                    }
                    Ok(Err(e)) => {
                        error!("Package database failed to load: {}", e);
                        State::Failed(e.to_string())
                    }
                    Err(_) => State::Failed("loader thread panicked".to_string()),
                };
            }
        }

        match &self.state {
            State::Failed(message) => Err(Error::BackendInit(message.clone())),
            _ => Ok(()),
        }
    }

    /// The loaded database; call `wait()` first
    pub fn get(&self) -> Result<&D> {
        match &self.state {
            State::Ready(database) => Ok(database),
            State::Loading(_) => Err(Error::InvalidState(
                "package database is still loading".to_string(),
            )),
            State::Failed(message) => Err(Error::BackendInit(message.clone())),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut D> {
        match &mut self.state {
            State::Ready(database) => Ok(database),
            State::Loading(_) => Err(Error::InvalidState(
                "package database is still loading".to_string(),
            )),
            State::Failed(message) => Err(Error::BackendInit(message.clone())),
        }
    }
}
