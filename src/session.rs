//! A store bound to its persisted blob.
//!
//! Opening a session loads the saved state into a `TaskStore` and subscribes a listener
//! that marks the session dirty on any change. `commit` drains the store's follow-ups and
//! saves once if anything changed.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::store::TaskStore;
use crate::time::SystemClock;

pub struct Session {
    db: Database,
    pub store: TaskStore<SystemClock>,
    dirty: Rc<Cell<bool>>,
}

impl Session {
    pub fn open(db: Database) -> Result<Self> {
        let state = db.load()?;
        let mut store = TaskStore::from_state(state, SystemClock);
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        store.subscribe(move |event, _| {
            debug!(?event, "store changed");
            flag.set(true);
        });
        Ok(Session { db, store, dirty })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run pending follow-ups, then save if the state changed. Returns whether it saved.
    pub fn commit(&mut self) -> Result<bool> {
        self.store.run_pending();
        if !self.dirty.replace(false) {
            return Ok(false);
        }
        self.db.save(self.store.state())?;
        Ok(true)
    }
}
