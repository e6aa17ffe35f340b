//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! A minimal actor: one thread, one `State`, and an ordered queue of
//! closures mutating that state. Delayed sends double as timers; a
//! delayed task that has been logically cancelled is discarded by the
//! task itself (see the generation ids in `call_fsm`).

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        atomic::{self, AtomicBool},
        mpsc::{channel, RecvError, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

pub struct Actor<State> {
    sender: Sender<Task<State>>,
    stopper: Stopper,
}

impl<State: 'static> Actor<State> {
    pub fn new(
        stopper: Stopper,
        gen_state: impl FnOnce(Actor<State>) -> State + Send + 'static,
    ) -> Self {
        let (sender, receiver) = channel::<Task<State>>();

        // One flag inside the loop to observe stopping, one outside to
        // trigger it.
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_to_register = stopped.clone();
        let stopper_to_register = stopper.clone();

        let actor = Self { sender, stopper };
        let actor_to_register = actor.clone();
        let actor_for_state = actor.clone();
        let join_handle = thread::spawn(move || {
            let mut state = gen_state(actor_for_state);
            let mut delayed = BinaryHeap::<Task<State>>::new();
            loop {
                // select { delayed.pop() on deadline, receiver.recv() },
                // done by hand with recv_timeout.
                let task = match delayed.peek() {
                    None => match receiver.recv() {
                        Ok(task) => task,
                        Err(RecvError) => break,
                    },
                    Some(next) => match receiver.recv_timeout(next.remaining()) {
                        Ok(task) => task,
                        Err(RecvTimeoutError::Disconnected) => break,
                        // Deadline reached; run it as an immediate task.
                        Err(RecvTimeoutError::Timeout) => match delayed.pop() {
                            Some(task) => task.into_immediate(),
                            None => continue,
                        },
                    },
                };
                if stopped.load(atomic::Ordering::Relaxed) {
                    break;
                }
                if task.is_delayed() {
                    delayed.push(task);
                } else {
                    (task.run)(&mut state);
                }
            }
        });
        stopper_to_register.register(
            Box::new(actor_to_register),
            stopped_to_register,
            join_handle,
        );
        actor
    }

    pub fn send(&self, run: impl FnOnce(&mut State) + Send + 'static) {
        let _ = self.sender.send(Task::immediate(Box::new(run)));
    }

    pub fn send_delayed(&self, delay: Duration, run: impl FnOnce(&mut State) + Send + 'static) {
        let _ = self.sender.send(Task::delayed(Box::new(run), delay));
    }

    pub fn stopper(&self) -> &Stopper {
        &self.stopper
    }
}

// #[derive(Clone)] would constrain State: Clone.
impl<State> Clone for Actor<State> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopper: self.stopper.clone(),
        }
    }
}

impl<State> Stop for Actor<State> {
    fn stop(&self, stopped: &AtomicBool) {
        stopped.store(true, atomic::Ordering::Relaxed);
        // An empty task kicks the loop if it is blocked in recv().
        let _ = self.sender.send(Task::immediate(Box::new(|_state| {})));
    }
}

type BoxedTaskFn<State> = Box<dyn FnOnce(&mut State) + Send>;

struct Task<State> {
    run: BoxedTaskFn<State>,
    deadline: Option<Instant>, // None == immediately
}

impl<State> Task<State> {
    fn immediate(run: BoxedTaskFn<State>) -> Self {
        Self {
            run,
            deadline: None,
        }
    }

    fn delayed(run: BoxedTaskFn<State>, delay: Duration) -> Self {
        Self {
            run,
            deadline: Some(Instant::now() + delay),
        }
    }

    fn into_immediate(self) -> Self {
        Self {
            run: self.run,
            deadline: None,
        }
    }

    fn is_delayed(&self) -> bool {
        self.deadline.is_some()
    }

    fn remaining(&self) -> Duration {
        match self.deadline {
            None => Duration::from_secs(0),
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        }
    }
}

impl<T> Ord for Task<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest deadline first out of the BinaryHeap.
        self.deadline.cmp(&other.deadline).reverse()
    }
}

impl<T> PartialOrd for Task<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl<T> Eq for Task<T> {}

trait Stop: Send {
    fn stop(&self, stopped: &AtomicBool);
}

/// Stops every actor registered with it, in one shot. Actors are
/// cloneable but JoinHandles are not, so joining has to live here
/// rather than on the actor itself.
#[derive(Clone, Default)]
pub struct Stopper {
    actors: Arc<Mutex<Vec<(Box<dyn Stop>, Arc<AtomicBool>, thread::JoinHandle<()>)>>>,
}

impl Stopper {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &self,
        actor: Box<dyn Stop>,
        stopped: Arc<AtomicBool>,
        join_handle: thread::JoinHandle<()>,
    ) {
        let mut actors = self.actors.lock().expect("Couldn't get lock to add actor");
        actors.push((actor, stopped, join_handle));
    }

    /// Stop all the actors associated with this Stopper without waiting
    /// for their threads to end.
    pub fn stop_all_without_joining(&self) -> Vec<thread::JoinHandle<()>> {
        let mut actors = self
            .actors
            .lock()
            .expect("Couldn't get lock to stop actors");
        actors
            .drain(..)
            .map(|(actor, stopped, join_handle)| {
                actor.stop(&stopped);
                join_handle
            })
            .collect()
    }

    /// Stop all the actors associated with this Stopper and join their
    /// threads.
    pub fn stop_all_and_join(&self) {
        for join_handle in self.stop_all_without_joining() {
            join_handle.join().expect("Failed to join actor thread");
        }
    }
}
