use std::path::PathBuf;
use std::sync::Arc;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_core::policy::Reward;

use crate::arrow::array::{ArrayRef, Float32Array, RecordBatch, UInt64Array};
use crate::arrow::datatypes::{DataType, Field, Schema};
use crate::result::{ResultWriter, WriterType};

#[derive(Debug)]
pub struct RewardWriter {
    time_step: Vec<u64>,
    agent_id: Vec<u64>,
    reward: Vec<f32>,
    to_output: WriterType,
}

impl RewardWriter {
    pub fn new(output_file: &PathBuf) -> Self {
        Self {
            to_output: WriterType::new(output_file, Self::schema()),
            time_step: Vec::new(),
            agent_id: Vec::new(),
            reward: Vec::new(),
        }
    }

    pub fn add_data(&mut self, time_ms: TimeMS, agent_id: AgentId, reward: Reward) {
        self.time_step.push(time_ms.as_u64());
        self.agent_id.push(agent_id.as_u64());
        self.reward.push(reward.as_f32());
    }
}

impl ResultWriter for RewardWriter {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("time_step", DataType::UInt64, false),
            Field::new("agent_id", DataType::UInt64, false),
            Field::new("reward", DataType::Float32, false),
        ])
    }

    fn write_to_file(&mut self) {
        let record_batch = RecordBatch::try_from_iter(vec![
            (
                "time_step",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.time_step))) as ArrayRef,
            ),
            (
                "agent_id",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.agent_id))) as ArrayRef,
            ),
            (
                "reward",
                Arc::new(Float32Array::from(std::mem::take(&mut self.reward))) as ArrayRef,
            ),
        ])
        .expect("Failed to convert results to record batch");
        match &mut self.to_output {
            WriterType::Parquet(to_output) => {
                to_output
                    .writer
                    .write(&record_batch)
                    .expect("Failed to write parquet");
            }
            WriterType::Csv(to_output) => {
                to_output
                    .writer
                    .write(&record_batch)
                    .expect("Failed to write csv");
            }
        }
    }

    fn close_file(self) {
        match self.to_output {
            WriterType::Parquet(to_output) => to_output.close(),
            WriterType::Csv(to_output) => to_output.close(),
        }
    }
}
