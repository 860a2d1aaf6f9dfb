use std::path::PathBuf;
use std::sync::Arc;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_models::handover::HandoverStats;

use crate::arrow::array::{ArrayRef, BooleanArray, RecordBatch, UInt32Array, UInt64Array};
use crate::arrow::datatypes::{DataType, Field, Schema};
use crate::result::{ResultWriter, WriterType};

#[derive(Debug)]
pub struct HandoverWriter {
    time_step: Vec<u64>,
    agent_id: Vec<u64>,
    action_code: Vec<u32>,
    ping_pong: Vec<bool>,
    interface_switch: Vec<bool>,
    to_output: WriterType,
}

impl HandoverWriter {
    pub fn new(output_file: &PathBuf) -> Self {
        Self {
            to_output: WriterType::new(output_file, Self::schema()),
            time_step: Vec::new(),
            agent_id: Vec::new(),
            action_code: Vec::new(),
            ping_pong: Vec::new(),
            interface_switch: Vec::new(),
        }
    }

    pub fn add_data(&mut self, time_ms: TimeMS, agent_id: AgentId, stats: &HandoverStats) {
        self.time_step.push(time_ms.as_u64());
        self.agent_id.push(agent_id.as_u64());
        self.action_code.push(stats.action_code() as u32);
        self.ping_pong.push(stats.ping_pong);
        self.interface_switch.push(stats.interface_switch);
    }
}

impl ResultWriter for HandoverWriter {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("time_step", DataType::UInt64, false),
            Field::new("agent_id", DataType::UInt64, false),
            Field::new("action_code", DataType::UInt32, false),
            Field::new("ping_pong", DataType::Boolean, false),
            Field::new("interface_switch", DataType::Boolean, false),
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
                "action_code",
                Arc::new(UInt32Array::from(std::mem::take(&mut self.action_code))) as ArrayRef,
            ),
            (
                "ping_pong",
                Arc::new(BooleanArray::from(std::mem::take(&mut self.ping_pong))) as ArrayRef,
            ),
            (
                "interface_switch",
                Arc::new(BooleanArray::from(std::mem::take(&mut self.interface_switch)))
                    as ArrayRef,
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
