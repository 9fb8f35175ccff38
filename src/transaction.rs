//! Programmable transaction value threaded through orchestration steps.
//!
//! Each step builds and returns its own [`ProgrammableTransaction`]; nothing
//! keeps a "current transaction" around between steps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ObjectId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Object(ObjectId),
    Pure(serde_json::Value),
}

/// Inputs and commands are addressed by `u16` index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall {
        target: String,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    TransferObjects {
        objects: Vec<Argument>,
        address: Argument,
    },
    MakeMoveVec {
        type_tag: Option<String>,
        elements: Vec<Argument>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgrammableTransaction {
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
    #[serde(skip)]
    object_inputs: HashMap<ObjectId, u16>,
}

fn index(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        Error::InvalidArgument(format!(
            "transaction can't hold more than {} {}",
            u32::from(u16::MAX) + 1,
            what
        ))
    })
}

impl ProgrammableTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(&self) -> &[CallArg] {
        &self.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Object input; the same id is only added once.
    pub fn object(&mut self, id: ObjectId) -> Result<Argument> {
        if let Some(index) = self.object_inputs.get(&id) {
            return Ok(Argument::Input(*index));
        }
        let argument = self.push_input(CallArg::Object(id))?;
        if let Argument::Input(index) = argument {
            self.object_inputs.insert(id, index);
        }
        Ok(argument)
    }

    pub fn pure(&mut self, value: impl Into<serde_json::Value>) -> Result<Argument> {
        self.push_input(CallArg::Pure(value.into()))
    }

    fn push_input(&mut self, input: CallArg) -> Result<Argument> {
        let index = index(self.inputs.len(), "inputs")?;
        self.inputs.push(input);
        Ok(Argument::Input(index))
    }

    fn push_command(&mut self, command: Command) -> Result<u16> {
        let index = index(self.commands.len(), "commands")?;
        self.commands.push(command);
        Ok(index)
    }

    /// Returns one nested result per amount.
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Result<Vec<Argument>> {
        let count = index(amounts.len(), "split amounts")?;
        let command = self.push_command(Command::SplitCoins { coin, amounts })?;
        Ok((0..count)
            .map(|nested| Argument::NestedResult(command, nested))
            .collect())
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> Result<()> {
        self.push_command(Command::MergeCoins {
            destination,
            sources,
        })?;
        Ok(())
    }

    pub fn move_call(
        &mut self,
        target: impl Into<String>,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> Result<Argument> {
        let command = self.push_command(Command::MoveCall {
            target: target.into(),
            type_arguments,
            arguments,
        })?;
        Ok(Argument::Result(command))
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, address: Argument) -> Result<()> {
        self.push_command(Command::TransferObjects { objects, address })?;
        Ok(())
    }

    pub fn make_move_vec(
        &mut self,
        type_tag: Option<String>,
        elements: Vec<Argument>,
    ) -> Result<Argument> {
        let command = self.push_command(Command::MakeMoveVec { type_tag, elements })?;
        Ok(Argument::Result(command))
    }
}
