use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::engine::{self, ClockTime, ExportRow, TimeField};

/// Stable identity of a task. Unlike its position, it never changes while
/// the task is alive and is never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(i64);

impl TaskId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: i64) -> Self {
        TaskId(raw)
    }
}

/// A single task, saved as an entry in the task table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub position: u32,
    pub name: String,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Task {
    #[cfg(test)]
    pub fn field(&self, field: TimeField) -> u32 {
        match field {
            TimeField::StartHour => self.start.hour,
            TimeField::StartMinute => self.start.minute,
            TimeField::EndHour => self.end.hour,
            TimeField::EndMinute => self.end.minute,
        }
    }

    /// Hours and minutes from start to end, rolling over midnight.
    pub fn duration(&self) -> (i64, i64) {
        engine::duration(self.start.hour, self.start.minute, self.end.hour, self.end.minute)
    }
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEvent {
    TaskAdded { position: u32 },
    TaskRemoved { position: u32 },
    Exported { path: PathBuf },
}

impl fmt::Display for ScheduleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleEvent::TaskAdded { .. } => write!(f, "New task added!"),
            ScheduleEvent::TaskRemoved { position } => write!(f, "Task {} removed!", position),
            ScheduleEvent::Exported { .. } => write!(f, "Excel sheet downloaded!"),
        }
    }
}

type Listener = Box<dyn Fn(&ScheduleEvent)>;

const SELECT_TASK: &str =
    "SELECT id, position, name, start_hour, start_minute, end_hour, end_minute FROM task";

/// The day being planned. Tasks live in an in-memory database that goes
/// away with the value.
pub struct Schedule {
    db: Connection,
    row_count: u32,
    listeners: Vec<Listener>,
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new() -> Result<Self> {
        let db = Connection::open_in_memory()
            .context("Failed to open the in-memory schedule database.")?;
        init_schedule(&db)?;
        Ok(Schedule {
            db,
            row_count: 0,
            listeners: Vec::new(),
        })
    }

    /// Register a listener called synchronously for every event.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&ScheduleEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&self, event: &ScheduleEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    /// Number of rows allocated so far. Grows with every add and falls back
    /// to the number of live tasks after a removal.
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Return the number of live tasks.
    pub fn tasks_count(&self) -> Result<u32> {
        let count = self
            .db
            .query_row("SELECT count(*) FROM task", [], |row| row.get::<_, u32>(0))
            .context("Failed to count tasks from database.")?;
        Ok(count)
    }

    /// Append a task after the last one. Its times are chained to the
    /// previous task's end, or start the day when it is the first task.
    /// Returns the position of the new task.
    pub fn add_task(&mut self) -> Result<u32> {
        let previous_end = self.last_task()?.map(|task| task.end);
        let (start, end) = engine::chained_slot(previous_end);
        let position = self.row_count + 1;

        self.db
            .execute(
                "INSERT INTO task (position, name, start_hour, start_minute, end_hour, end_minute)
                 VALUES (?1, '', ?2, ?3, ?4, ?5)",
                params![position, start.hour, start.minute, end.hour, end.minute],
            )
            .context("Failed to insert task to database.")?;

        self.row_count += 1;
        debug!(position, %start, %end, "task added");
        self.notify(&ScheduleEvent::TaskAdded { position });
        Ok(position)
    }

    /// Remove the task at `position`, shifting the tasks after it to the left
    /// to close the gap. Their fields and ids are untouched. Returns `false`
    /// without doing anything when there is no such task.
    pub fn remove_task(&mut self, position: u32) -> Result<bool> {
        let removed = self
            .db
            .execute("DELETE FROM task WHERE position = ?1", params![position])
            .context("Failed to remove task from database.")?;
        if removed == 0 {
            warn!(position, "no task to remove");
            return Ok(false);
        }

        // negate first so the shift never collides on the unique position index.
        self.db
            .execute(
                "UPDATE task SET position = - (position - 1) WHERE position > ?1",
                params![position],
            )
            .context("Failed to shift tasks to the left.")?;
        self.db
            .execute("UPDATE task SET position = - position WHERE position < 0", [])
            .context("Failed to shift tasks to the left.")?;

        self.row_count = self.tasks_count()?;
        debug!(position, remaining = self.row_count, "task removed");
        self.notify(&ScheduleEvent::TaskRemoved { position });
        Ok(true)
    }

    /// Write a raw edit of one time field. The value is coerced and clamped
    /// (see [`engine::normalize_value`]), then the end time is corrected.
    ///
    /// Returns the zero-padded value that was stored, or `None` when there
    /// is no task at `position`.
    pub fn set_field(&mut self, position: u32, field: TimeField, raw: &str) -> Result<Option<String>> {
        let value = engine::normalize_value(field, raw);
        let updated = self
            .db
            .execute(
                &format!("UPDATE task SET {} = ?1 WHERE position = ?2", field.column()),
                params![value, position],
            )
            .with_context(|| format!("Failed to update {} in database.", field))?;
        if updated == 0 {
            warn!(position, %field, "no task to update");
            return Ok(None);
        }

        debug!(position, %field, raw, value, "field normalized");
        self.auto_correct_end(position)?;
        Ok(Some(engine::pad(value)))
    }

    /// Make sure the task at `position` ends at least one minute after it
    /// starts. Does nothing for an unknown position.
    pub fn auto_correct_end(&mut self, position: u32) -> Result<()> {
        let task = match self.task(position)? {
            Some(task) => task,
            None => return Ok(()),
        };

        let end = engine::corrected_end(task.start, task.end);
        if end != task.end {
            self.db
                .execute(
                    "UPDATE task SET end_hour = ?1, end_minute = ?2 WHERE position = ?3",
                    params![end.hour, end.minute, position],
                )
                .context("Failed to correct end time in database.")?;
            debug!(position, from = %task.end, to = %end, "end time corrected");
        }
        Ok(())
    }

    /// Replace the name of the task at `position`. Returns `false` when there
    /// is no such task.
    pub fn set_name(&mut self, position: u32, name: &str) -> Result<bool> {
        let updated = self
            .db
            .execute(
                "UPDATE task SET name = ?1 WHERE position = ?2",
                params![name, position],
            )
            .context("Failed to rename task in database.")?;
        if updated == 0 {
            warn!(position, "no task to rename");
        }
        Ok(updated > 0)
    }

    /// Get the task at a given position.
    pub fn task(&self, position: u32) -> Result<Option<Task>> {
        let task = self
            .db
            .query_row(
                &format!("{} WHERE position = ?1", SELECT_TASK),
                params![position],
                task_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to get task at position {} from database.", position))?;
        Ok(task)
    }

    /// Get a task by its stable id, wherever it has moved to.
    #[allow(dead_code)]
    pub fn task_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        let task = self
            .db
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_TASK),
                params![id.0],
                task_from_row,
            )
            .optional()
            .context("Failed to get task by id from database.")?;
        Ok(task)
    }

    /// All live tasks, ordered by position.
    pub fn tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .db
            .prepare(&format!("{} ORDER BY position", SELECT_TASK))
            .context("Failed to fetch tasks from database.")?;
        let mapped_rows = stmt
            .query_map([], task_from_row)
            .context("Failed to fetch tasks from database.")?;

        let mut tasks = Vec::new();
        for task in mapped_rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    pub fn total_duration(&self) -> Result<String> {
        Ok(engine::total_duration(&self.tasks()?))
    }

    /// The rows handed to the spreadsheet export, in position order.
    pub fn export_table(&self) -> Result<Vec<ExportRow>> {
        Ok(engine::to_table(&self.tasks()?))
    }

    fn last_task(&self) -> Result<Option<Task>> {
        let task = self
            .db
            .query_row(
                &format!("{} ORDER BY position DESC LIMIT 1", SELECT_TASK),
                [],
                task_from_row,
            )
            .optional()
            .context("Failed to get the last task from database.")?;
        Ok(task)
    }
}

/// Create the task table.
fn init_schedule(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE task (
                  id              INTEGER PRIMARY KEY AUTOINCREMENT,
                  position        INTEGER NOT NULL,
                  name            TEXT NOT NULL,
                  start_hour      INTEGER NOT NULL,
                  start_minute    INTEGER NOT NULL,
                  end_hour        INTEGER NOT NULL,
                  end_minute      INTEGER NOT NULL
                  )",
        [],
    )
    .context("Failed to create task table.")?;

    db.execute("CREATE UNIQUE INDEX task_position ON task (position)", [])
        .context("Failed to create unique index on task table.")?;

    Ok(())
}

/// Return a task from a row in this order: [id, position, name,
/// start_hour, start_minute, end_hour, end_minute]
fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let task = Task {
        id: TaskId(row.get(0)?),
        position: row.get::<_, u32>(1)?,
        name: row.get(2)?,
        start: ClockTime::new(row.get(3)?, row.get(4)?),
        end: ClockTime::new(row.get(5)?, row.get(6)?),
    };
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn schedule_with(count: usize) -> Schedule {
        let mut schedule = Schedule::new().unwrap();
        for _ in 0..count {
            schedule.add_task().unwrap();
        }
        schedule
    }

    fn recorder(schedule: &mut Schedule) -> Rc<RefCell<Vec<ScheduleEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        schedule.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn first_task_starts_the_day() {
        let schedule = schedule_with(1);
        let task = schedule.task(1).unwrap().unwrap();
        assert_eq!(task.start, ClockTime::new(9, 0));
        assert_eq!(task.end, ClockTime::new(9, 1));
        assert_eq!(task.name, "");
    }

    #[test]
    fn new_tasks_are_chained() {
        let mut schedule = schedule_with(1);
        schedule.set_field(1, TimeField::EndHour, "10").unwrap();
        schedule.set_field(1, TimeField::EndMinute, "30").unwrap();

        assert_eq!(schedule.add_task().unwrap(), 2);
        let task = schedule.task(2).unwrap().unwrap();
        assert_eq!(task.start, ClockTime::new(10, 31));
        assert_eq!(task.end, ClockTime::new(10, 32));
        assert_eq!(schedule.row_count(), 2);
    }

    #[test]
    fn chaining_wraps_at_midnight() {
        let mut schedule = schedule_with(1);
        schedule.set_field(1, TimeField::StartHour, "23").unwrap();
        schedule.set_field(1, TimeField::StartMinute, "58").unwrap();
        assert_eq!(schedule.task(1).unwrap().unwrap().end, ClockTime::new(23, 59));

        schedule.add_task().unwrap();
        let task = schedule.task(2).unwrap().unwrap();
        assert_eq!(task.start, ClockTime::new(0, 0));
        assert_eq!(task.end, ClockTime::new(0, 1));
    }

    #[test]
    fn removing_closes_the_gap() {
        let mut schedule = schedule_with(3);
        schedule.set_name(3, "Review").unwrap();
        schedule.set_field(3, TimeField::EndHour, "15").unwrap();
        let third = schedule.task(3).unwrap().unwrap();

        assert!(schedule.remove_task(2).unwrap());

        let tasks = schedule.tasks().unwrap();
        assert_eq!(tasks.iter().map(|t| t.position).collect::<Vec<_>>(), vec![1, 2]);
        let moved = &tasks[1];
        assert_eq!(moved.id, third.id);
        assert_eq!(moved.name, "Review");
        assert_eq!(moved.start, third.start);
        assert_eq!(moved.end, third.end);
        assert_eq!(schedule.task_by_id(third.id).unwrap().unwrap().position, 2);
        assert_eq!(schedule.row_count(), 2);
    }

    #[test]
    fn removing_first_task_renumbers_all() {
        let mut schedule = schedule_with(3);
        assert!(schedule.remove_task(1).unwrap());
        assert!(schedule.remove_task(1).unwrap());
        let tasks = schedule.tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].position, 1);
        assert_eq!(tasks[0].start, ClockTime::new(9, 4));
    }

    #[test]
    fn removing_unknown_task_is_a_no_op() {
        let mut schedule = schedule_with(2);
        let events = recorder(&mut schedule);

        assert!(!schedule.remove_task(5).unwrap());
        assert!(!schedule.remove_task(0).unwrap());
        assert_eq!(schedule.tasks_count().unwrap(), 2);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut schedule = schedule_with(2);
        let second = schedule.task(2).unwrap().unwrap().id;
        schedule.remove_task(2).unwrap();
        schedule.add_task().unwrap();
        assert_ne!(schedule.task(2).unwrap().unwrap().id, second);
        assert_eq!(schedule.task_by_id(second).unwrap(), None);
    }

    #[test]
    fn fields_are_coerced_and_padded() {
        let mut schedule = schedule_with(1);
        assert_eq!(
            schedule.set_field(1, TimeField::StartMinute, "7").unwrap(),
            Some("07".to_string())
        );
        assert_eq!(
            schedule.set_field(1, TimeField::EndHour, "42").unwrap(),
            Some("23".to_string())
        );
        assert_eq!(
            schedule.set_field(1, TimeField::EndMinute, "ninety").unwrap(),
            Some("00".to_string())
        );
        let task = schedule.task(1).unwrap().unwrap();
        assert_eq!(task.start, ClockTime::new(9, 7));
        assert_eq!(task.field(TimeField::EndHour), 23);
        assert_eq!(task.field(TimeField::EndMinute), 0);
    }

    #[test]
    fn editing_start_corrects_end() {
        let mut schedule = schedule_with(1);
        schedule.set_field(1, TimeField::StartHour, "14").unwrap();
        let task = schedule.task(1).unwrap().unwrap();
        assert_eq!(task.end, ClockTime::new(14, 1));

        schedule.set_field(1, TimeField::EndHour, "3").unwrap();
        let task = schedule.task(1).unwrap().unwrap();
        assert_eq!(task.end, ClockTime::new(14, 1));
    }

    #[test]
    fn editing_unknown_task_changes_nothing() {
        let mut schedule = schedule_with(1);
        assert_eq!(schedule.set_field(2, TimeField::StartHour, "10").unwrap(), None);
        assert!(!schedule.set_name(2, "ghost").unwrap());
        assert_eq!(schedule.tasks().unwrap().len(), 1);
    }

    #[test]
    fn total_and_table() {
        let mut schedule = schedule_with(1);
        schedule.set_field(1, TimeField::EndMinute, "30").unwrap();
        schedule.add_task().unwrap();
        schedule.set_field(2, TimeField::EndHour, "10").unwrap();
        schedule.set_field(2, TimeField::EndMinute, "16").unwrap();
        schedule.set_name(2, "Planning").unwrap();

        assert_eq!(schedule.total_duration().unwrap(), "1 hr, 15 min");

        let table = schedule.export_table().unwrap();
        assert_eq!(table.len(), schedule.tasks().unwrap().len());
        assert_eq!(table[1].cells(), ["Planning", "09:31", "10:16", "45 min"]);
    }

    #[test]
    fn events_are_delivered() {
        let mut schedule = Schedule::new().unwrap();
        let events = recorder(&mut schedule);

        schedule.add_task().unwrap();
        schedule.add_task().unwrap();
        schedule.remove_task(1).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                ScheduleEvent::TaskAdded { position: 1 },
                ScheduleEvent::TaskAdded { position: 2 },
                ScheduleEvent::TaskRemoved { position: 1 },
            ]
        );
        assert_eq!(events.borrow()[2].to_string(), "Task 1 removed!");
    }
}
