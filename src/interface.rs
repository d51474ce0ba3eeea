use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use chrono::Local;
use prettytable::{format, Table};
use structopt::StructOpt;
use tracing::error;

use crate::cli::Command;
use crate::engine;
use crate::export;
use crate::model::{Schedule, ScheduleEvent};

/// Task names wider than this wrap inside the preview table.
const NAME_WIDTH: usize = 32;

/// What the loop does after a command.
enum Flow {
    Continue,
    Render,
    Quit,
}

/// An interactive session over one schedule. Reads one command per line and
/// prints the sheet preview after every change.
pub struct Session {
    schedule: Schedule,
    notifications: Rc<RefCell<Vec<ScheduleEvent>>>,
    output_dir: PathBuf,
}

impl Session {
    pub fn new(mut schedule: Schedule, output_dir: PathBuf) -> Self {
        let notifications = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notifications);
        schedule.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Session {
            schedule,
            notifications,
            output_dir,
        }
    }

    #[cfg(test)]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run commands from `input` until it is exhausted or the user quits.
    /// Failing commands are reported and the session goes on.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        list(&self.schedule, out)?;

        for line in input.lines() {
            let line = line.context("Failed to read command.")?;
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            let command = match Command::from_iter_safe(words) {
                Ok(command) => command,
                Err(err) => {
                    writeln!(out, "{}", err.message)?;
                    continue;
                }
            };

            let flow = match self.execute(command, out) {
                Ok(flow) => flow,
                Err(err) => {
                    error!("{:#}", err);
                    writeln!(out, "Error: {:#}", err)?;
                    Flow::Continue
                }
            };

            self.print_notifications(out)?;
            match flow {
                Flow::Quit => break,
                Flow::Render => list(&self.schedule, out)?,
                Flow::Continue => {}
            }
        }
        Ok(())
    }

    fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        match command {
            Command::Add => {
                self.schedule.add_task()?;
                Ok(Flow::Render)
            }
            Command::Rm { position } => {
                if self.schedule.remove_task(position)? {
                    Ok(Flow::Render)
                } else {
                    no_such_task(out, position)
                }
            }
            Command::Set {
                position,
                field,
                value,
            } => match self.schedule.set_field(position, field, &value)? {
                Some(written) => {
                    writeln!(out, "Task {} {} set to {}.", position, field, written)?;
                    Ok(Flow::Render)
                }
                None => no_such_task(out, position),
            },
            Command::Name { position, name } => {
                if self.schedule.set_name(position, &name.join(" "))? {
                    Ok(Flow::Render)
                } else {
                    no_such_task(out, position)
                }
            }
            Command::List => {
                list(&self.schedule, out)?;
                Ok(Flow::Continue)
            }
            Command::Total => {
                writeln!(out, "Total Duration: {}", self.schedule.total_duration()?)?;
                Ok(Flow::Continue)
            }
            Command::Export { dir } => {
                let dir = dir.unwrap_or_else(|| self.output_dir.clone());
                let path = export::export(&self.schedule, &dir, Local::now().date_naive())?;
                writeln!(out, "Saved {}", path.display())?;
                Ok(Flow::Continue)
            }
            Command::Quit => Ok(Flow::Quit),
        }
    }

    fn print_notifications<W: Write>(&self, out: &mut W) -> Result<()> {
        for event in self.notifications.borrow_mut().drain(..) {
            writeln!(out, "» {}", event)?;
        }
        Ok(())
    }
}

fn no_such_task<W: Write>(out: &mut W, position: u32) -> Result<Flow> {
    writeln!(out, "There is no task {}.", position)?;
    Ok(Flow::Continue)
}

/// Print the sheet preview followed by the total duration and row count.
pub fn list<W: Write>(schedule: &Schedule, out: &mut W) -> Result<()> {
    let tasks = schedule.tasks()?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["#", "Task Name", "Start Time", "End Time", "Duration"]);
    for (task, row) in tasks.iter().zip(engine::to_table(&tasks)) {
        table.add_row(row![
            task.position,
            textwrap::fill(&row.task_name, NAME_WIDTH),
            row.start_time,
            row.end_time,
            row.duration
        ]);
    }
    table
        .print(out)
        .context("Failed to print the schedule.")?;

    writeln!(out, "Total Duration: {}", engine::total_duration(&tasks))?;
    writeln!(out, "Rows: {}", schedule.row_count())?;
    Ok(())
}
