// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! Command dispatch, argument validation, and reply-type selection.
//! Stateless beyond its references to the store and the expiry engine;
//! safe to invoke concurrently from multiple sessions.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::CommandError;
use crate::expiry::ExpiryEngine;
use crate::protocol::Reply;
use crate::store::Store;

pub struct Executor {
    store: Arc<Store>,
    expiry: Arc<ExpiryEngine>,
    clock: Arc<dyn Clock>,
}

impl Executor {
    pub fn new(store: Arc<Store>, expiry: Arc<ExpiryEngine>, clock: Arc<dyn Clock>) -> Self {
        Executor {
            store,
            expiry,
            clock,
        }
    }

    /// Dispatches on the uppercased first element of `command`. Command
    /// names are case-insensitive; arguments remain case-sensitive.
    pub fn execute(&self, command: &[String]) -> Result<Reply, CommandError> {
        let (name, args) = command
            .split_first()
            .ok_or_else(|| CommandError::new("ERR empty command"))?;
        let name = name.to_uppercase();

        match name.as_str() {
            "PING" => self.ping(args),
            "GET" => self.get(args),
            "SET" => self.set(args),
            "INCR" => self.incr(args),
            "EXPIRE" => self.expire(args),
            "TTL" => self.ttl(args),
            other => Err(CommandError::unknown_command(other)),
        }
    }

    fn ping(&self, args: &[String]) -> Result<Reply, CommandError> {
        match args {
            [] => Ok(Reply::SimpleString("PONG".to_string())),
            [value] => Ok(Reply::BulkString(Some(value.clone()))),
            _ => Err(CommandError::wrong_arity("ping")),
        }
    }

    fn get(&self, args: &[String]) -> Result<Reply, CommandError> {
        let [key] = args else {
            return Err(CommandError::wrong_arity("get"));
        };
        self.expiry.check_and_remove_expired(key);
        Ok(Reply::BulkString(self.store.get(key)))
    }

    fn set(&self, args: &[String]) -> Result<Reply, CommandError> {
        let [key, value] = args else {
            return Err(CommandError::wrong_arity("set"));
        };
        // SET is unconditional and clears deadlines itself; no passive
        // check is performed first.
        self.store.set(key, value.clone());
        Ok(Reply::SimpleString("OK".to_string()))
    }

    fn incr(&self, args: &[String]) -> Result<Reply, CommandError> {
        let [key] = args else {
            return Err(CommandError::wrong_arity("incr"));
        };
        self.expiry.check_and_remove_expired(key);

        let current = self.store.get(key);
        let new_value = match current {
            None => 1i64,
            Some(raw) => {
                let parsed: i64 = raw.parse().map_err(|_| CommandError::not_an_integer())?;
                parsed
                    .checked_add(1)
                    .ok_or_else(CommandError::not_an_integer)?
            }
        };
        self.store.set(key, new_value.to_string());
        Ok(Reply::Integer(new_value))
    }

    fn expire(&self, args: &[String]) -> Result<Reply, CommandError> {
        let [key, seconds] = args else {
            return Err(CommandError::wrong_arity("expire"));
        };
        let seconds: i64 = seconds.parse().map_err(|_| CommandError::not_an_integer())?;
        if seconds < 0 {
            return Err(CommandError::invalid_expire_time());
        }

        self.expiry.check_and_remove_expired(key);
        if !self.store.exists(key) {
            return Ok(Reply::Integer(0));
        }

        let deadline = self.clock.now() + seconds as f64;
        self.store.set_deadline(key, deadline);
        Ok(Reply::Integer(1))
    }

    fn ttl(&self, args: &[String]) -> Result<Reply, CommandError> {
        let [key] = args else {
            return Err(CommandError::wrong_arity("ttl"));
        };
        self.expiry.check_and_remove_expired(key);

        if !self.store.exists(key) {
            return Ok(Reply::Integer(-2));
        }
        let deadline = match self.store.get_deadline(key) {
            None => return Ok(Reply::Integer(-1)),
            Some(d) => d,
        };

        let remaining = (deadline - self.clock.now()).floor() as i64;
        Ok(Reply::Integer(remaining.max(0)))
    }
}
