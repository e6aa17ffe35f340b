//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Wrapper around `std::sync::Mutex::lock()` that consumes a poisoned
//! mutex and returns a simple error code instead of the guard-laden
//! `PoisonError`.

use std::sync::{Mutex, MutexGuard};

use crate::{common::Result, error::CallError};

pub struct CallMutex<T: ?Sized> {
    /// Human readable label for the mutex, used in the error.
    label: &'static str,
    mutex: Mutex<T>,
}

impl<T> CallMutex<T> {
    pub fn new(t: T, label: &'static str) -> CallMutex<T> {
        CallMutex {
            mutex: Mutex::new(t),
            label,
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        match self.mutex.lock() {
            Ok(v) => Ok(v),
            Err(_) => Err(CallError::MutexPoisoned(self.label.to_string()).into()),
        }
    }
}
