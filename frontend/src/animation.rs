//! Timer host for [`AnimationDriver`].
//!
//! Watches the `animating` flag and speed in the selection, owns the single
//! running timer task and turns its ticks into acquisition edits.

use std::cell::RefCell;
use std::rc::Rc;

use shared::SelectionEdit;
use shared::animation::{AnimationDriver, TimerStart};
use zoon::*;

use crate::plate_session::PlateSession;

pub struct AnimationHost {
    _watcher: TaskHandle,
}

impl AnimationHost {
    pub fn new(session: PlateSession) -> Self {
        let driver = Rc::new(RefCell::new(AnimationDriver::new(
            session.selection.lock_ref().animation_speed,
        )));
        let timer: Rc<RefCell<Option<TaskHandle>>> = Rc::default();

        let watcher = Task::start_droppable(
            session
                .selection_signal(|selection| (selection.animating, selection.animation_speed))
                .dedupe()
                .for_each(move |(animating, speed)| {
                    let start = {
                        let mut driver = driver.borrow_mut();
                        match (animating, driver.is_running()) {
                            (true, false) => {
                                driver.set_speed(speed);
                                Some(driver.start())
                            }
                            (true, true) => driver.set_speed(speed),
                            (false, running) => {
                                driver.set_speed(speed);
                                if running {
                                    driver.stop();
                                    timer.borrow_mut().take();
                                }
                                None
                            }
                        }
                    };
                    if let Some(start) = start {
                        // Replacing the handle cancels the previous timer.
                        *timer.borrow_mut() = Some(Task::start_droppable(run_timer(
                            session.clone(),
                            driver.clone(),
                            start,
                        )));
                    }
                    async {}
                }),
        );
        Self { _watcher: watcher }
    }
}

async fn run_timer(session: PlateSession, driver: Rc<RefCell<AnimationDriver>>, start: TimerStart) {
    loop {
        Timer::sleep(start.delay_ms).await;
        let Some(plate) = session.current_plate() else {
            continue;
        };
        let ids = plate.acquisition_ids();
        let current = session
            .selection
            .lock_ref()
            .acquisition_id
            .as_deref()
            .and_then(|id| plate.acquisition_index(id));
        let Some(next) = driver.borrow().tick(start.generation, current, ids.len()) else {
            continue;
        };
        if let Some(id) = ids.get(next) {
            session.edit(SelectionEdit::Acquisition(id.clone()));
        }
    }
}
