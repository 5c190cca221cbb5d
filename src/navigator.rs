//! Interactive drill-down: card tables, columns, cards, card actions.
//!
//! The session is a loop over [`State`]. Each turn reads one [`Action`],
//! performs its side effects, and then moves to `state.next(&action)` unless
//! the effect asked to stay put or to quit. Board data is never patched
//! locally; anything that changes the server is followed by a refetch.

use crate::backlog::{BacklogStore, merge};
use crate::board::BoardApi;
use crate::error::{Error, Result};
use crate::input::{self, Ack, Choice, ItemCommand};
use crate::models::{CardTable, Column, Item};
use crate::render;
use crate::summarizer::Summarizer;
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Comment left by `ctx N`
pub const CONTEXT_REQUEST: &str = "Please can I have more context";

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    AtTables,
    AtColumns,
    AtItems,
    Finished,
}

/// Everything the operator (or the session itself) can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ShowTables,
    ShowColumns(usize),
    ShowItems(usize),
    ItemDetails(usize),
    AddComment(usize),
    MoveItem(usize),
    GenerateEpic(Vec<usize>),
    Refetch,
    Back,
    Quit,
}

impl State {
    /// Transition taken once `action`'s side effects went through
    pub fn next(self, action: &Action) -> State {
        use Action::*;

        match (self, action) {
            (State::Finished, _) | (_, Quit) => State::Finished,

            (State::Start, ShowTables) => State::AtTables,
            (
                State::Start,
                ShowColumns(_) | ShowItems(_) | ItemDetails(_) | AddComment(_) | MoveItem(_)
                | GenerateEpic(_) | Refetch | Back,
            ) => State::Start,

            (State::AtTables, ShowColumns(_)) => State::AtColumns,
            (
                State::AtTables,
                ShowTables | ShowItems(_) | ItemDetails(_) | AddComment(_) | MoveItem(_)
                | GenerateEpic(_) | Refetch | Back,
            ) => State::AtTables,

            (State::AtColumns, ShowItems(_)) => State::AtItems,
            (State::AtColumns, Back) => State::AtTables,
            (
                State::AtColumns,
                ShowTables | ShowColumns(_) | ItemDetails(_) | AddComment(_) | MoveItem(_)
                | GenerateEpic(_) | Refetch,
            ) => State::AtColumns,

            (State::AtItems, Back) => State::AtColumns,
            (
                State::AtItems,
                ShowTables | ShowColumns(_) | ShowItems(_) | ItemDetails(_) | AddComment(_)
                | MoveItem(_) | GenerateEpic(_) | Refetch,
            ) => State::AtItems,
        }
    }
}

/// What performing an action asks of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Proceed,
    Stay,
    Quit,
}

impl From<Ack> for Outcome {
    fn from(ack: Ack) -> Self {
        match ack {
            Ack::Back => Outcome::Proceed,
            Ack::Quit => Outcome::Quit,
        }
    }
}

/// Columns a card in `current_column_id` can be moved to, in board order
pub fn move_targets(columns: &[Column], current_column_id: i64) -> Vec<&Column> {
    columns
        .iter()
        .filter(|column| column.id != current_column_id)
        .collect()
}

/// Interactive session over a board
pub struct Navigator<'a, B, S, R, W> {
    board: &'a B,
    summarizer: &'a S,
    store: BacklogStore,
    input: R,
    out: W,
    tables: Vec<CardTable>,
    table: usize,
    columns: Vec<Column>,
    column: usize,
    items: Vec<Item>,
}

impl<'a, B, S, R, W> Navigator<'a, B, S, R, W>
where
    B: BoardApi,
    S: Summarizer,
    R: BufRead,
    W: Write,
{
    pub fn new(board: &'a B, summarizer: &'a S, store: BacklogStore, input: R, out: W) -> Self {
        Navigator {
            board,
            summarizer,
            store,
            input,
            out,
            tables: Vec::new(),
            table: 0,
            columns: Vec::new(),
            column: 0,
            items: Vec::new(),
        }
    }

    /// Run until the operator quits or input ends
    pub fn run(&mut self) -> Result<()> {
        let mut state = self.step(State::Start, Action::ShowTables)?;
        while state != State::Finished {
            let action = self.read_action(state)?;
            state = self.step(state, action)?;
        }
        Ok(())
    }

    fn step(&mut self, state: State, action: Action) -> Result<State> {
        debug!(?state, ?action, "step");
        Ok(match self.perform(&action)? {
            Outcome::Proceed => state.next(&action),
            Outcome::Stay => state,
            Outcome::Quit => State::Finished,
        })
    }

    // ==================== Prompts ====================

    fn read_action(&mut self, state: State) -> Result<Action> {
        match state {
            State::AtTables => {
                let labels: Vec<String> = self.tables.iter().map(|t| t.title.clone()).collect();
                let choice = self.choose("Card Tables", &labels, false)?;
                Ok(match choice {
                    Choice::Index(i) => Action::ShowColumns(i),
                    Choice::Back | Choice::Quit => Action::Quit,
                })
            }
            State::AtColumns => {
                let labels: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
                Ok(match self.choose("Columns", &labels, true)? {
                    Choice::Index(i) => Action::ShowItems(i),
                    Choice::Back => Action::Back,
                    Choice::Quit => Action::Quit,
                })
            }
            State::AtItems => {
                write!(self.out, "{}", render::CLEAR_SCREEN)?;
                render::items_menu(&mut self.out, &self.items)?;
                let count = self.items.len();
                let command = self.prompt("Selection: ", |line| {
                    input::parse_item_command(line, count)
                })?;
                Ok(match command {
                    Some(ItemCommand::Details(i)) => Action::ItemDetails(i),
                    Some(ItemCommand::Comment(i)) => Action::AddComment(i),
                    Some(ItemCommand::Move(i)) => Action::MoveItem(i),
                    Some(ItemCommand::Select(indexes)) => Action::GenerateEpic(indexes),
                    Some(ItemCommand::Refetch) => Action::Refetch,
                    Some(ItemCommand::Back) => Action::Back,
                    Some(ItemCommand::Quit) | None => Action::Quit,
                })
            }
            State::Start | State::Finished => Ok(Action::Quit),
        }
    }

    /// Numbered menu; end of input reads as quit
    fn choose(&mut self, title: &str, labels: &[String], allow_back: bool) -> Result<Choice> {
        write!(self.out, "{}", render::CLEAR_SCREEN)?;
        render::menu(&mut self.out, title, labels)?;
        let count = labels.len();
        let choice = self.prompt(render::choice_prompt(allow_back), |line| {
            input::parse_choice(line, count, allow_back)
        })?;
        Ok(choice.unwrap_or(Choice::Quit))
    }

    fn acknowledge(&mut self) -> Result<Outcome> {
        let ack = self.prompt("Press b to go back or q to quit: ", input::parse_ack)?;
        Ok(ack.unwrap_or(Ack::Quit).into())
    }

    /// Re-issue `text` until `parse` accepts a line. `None` on end of input.
    fn prompt<T, F>(&mut self, text: &str, parse: F) -> Result<Option<T>>
    where
        F: Fn(&str) -> Option<T>,
    {
        loop {
            write!(self.out, "{text}")?;
            self.out.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                debug!("end of input");
                return Ok(None);
            }
            if let Some(value) = parse(&line) {
                return Ok(Some(value));
            }
            writeln!(self.out, "Invalid selection.")?;
        }
    }

    // ==================== Actions ====================

    fn perform(&mut self, action: &Action) -> Result<Outcome> {
        match action {
            Action::ShowTables => {
                self.tables = self.board.list_card_tables()?;
                if self.tables.is_empty() {
                    return Err(Error::NoCardTables);
                }
                Ok(Outcome::Proceed)
            }
            Action::ShowColumns(index) => {
                self.table = *index;
                self.columns = self.board.list_columns(&self.tables[self.table])?;
                if self.columns.is_empty() {
                    writeln!(self.out, "No columns found for this card table.")?;
                    return Ok(Outcome::Stay);
                }
                Ok(Outcome::Proceed)
            }
            Action::ShowItems(index) => {
                self.column = *index;
                self.refetch_items()?;
                if self.items.is_empty() {
                    writeln!(self.out, "No cards in this column.")?;
                    return Ok(Outcome::Stay);
                }
                Ok(Outcome::Proceed)
            }
            Action::ItemDetails(index) => self.show_details(*index),
            Action::AddComment(index) => self.add_comment(*index),
            Action::MoveItem(index) => self.move_item(*index),
            Action::GenerateEpic(indexes) => self.generate_epic(indexes),
            Action::Refetch => {
                self.refetch_items()?;
                Ok(Outcome::Proceed)
            }
            Action::Back => Ok(Outcome::Proceed),
            Action::Quit => Ok(Outcome::Quit),
        }
    }

    fn refetch_items(&mut self) -> Result<()> {
        let table = &self.tables[self.table];
        let column = &self.columns[self.column];
        self.items = self.board.list_items(table, column)?;
        Ok(())
    }

    fn show_details(&mut self, index: usize) -> Result<Outcome> {
        let details = self
            .board
            .get_item_details(&self.tables[self.table], &self.items[index])?;
        write!(self.out, "{}", render::CLEAR_SCREEN)?;
        render::item_details(&mut self.out, &details)?;
        self.acknowledge()
    }

    fn add_comment(&mut self, index: usize) -> Result<Outcome> {
        let added = self.board.post_comment(&self.items[index], CONTEXT_REQUEST)?;
        if added {
            writeln!(self.out, "Comment added.")?;
        } else {
            writeln!(self.out, "Failed to add comment.")?;
        }
        self.acknowledge()
    }

    fn move_item(&mut self, index: usize) -> Result<Outcome> {
        let current = &self.columns[self.column];
        let targets: Vec<Column> = move_targets(&self.columns, current.id)
            .into_iter()
            .cloned()
            .collect();

        if targets.is_empty() {
            writeln!(self.out, "No other columns to move to.")?;
            return self.acknowledge();
        }

        let labels: Vec<String> = targets.iter().map(|c| c.name.clone()).collect();
        let target = match self.choose("Move card to column", &labels, true)? {
            Choice::Index(i) => &targets[i],
            Choice::Back => return Ok(Outcome::Proceed),
            Choice::Quit => return Ok(Outcome::Quit),
        };

        let moved = self.board.move_item(&self.items[index], target.id)?;
        if moved {
            writeln!(self.out, "Card moved.")?;
        } else {
            writeln!(self.out, "Failed to move card.")?;
        }
        self.refetch_items()?;
        self.acknowledge()
    }

    fn generate_epic(&mut self, indexes: &[usize]) -> Result<Outcome> {
        let selected: Vec<&Item> = indexes.iter().filter_map(|&i| self.items.get(i)).collect();
        if selected.is_empty() {
            writeln!(self.out, "No valid cards selected.")?;
            return Ok(Outcome::Proceed);
        }

        let table = &self.tables[self.table];
        let details = selected
            .into_iter()
            .map(|item| self.board.get_item_details(table, item))
            .collect::<Result<Vec<_>>>()?;

        let backlog = self.store.load()?;
        let epic = self.summarizer.generate_epic(&details, &backlog)?;
        let (title, task_count) = (epic.epic.clone(), epic.tasks.len());
        let backlog = merge(backlog, epic);
        self.store.save(&backlog)?;

        info!(epic = %title, tasks = task_count, "added epic to backlog");
        writeln!(
            self.out,
            "Added epic \"{title}\" with {task_count} tasks to {}.",
            self.store.path().display()
        )?;
        self.acknowledge()
    }
}
