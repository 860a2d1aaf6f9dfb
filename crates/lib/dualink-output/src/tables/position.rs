use std::path::PathBuf;
use std::sync::Arc;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_models::mobility::Point2D;

use crate::arrow::array::{ArrayRef, Float32Array, Float64Array, RecordBatch, UInt64Array};
use crate::arrow::datatypes::{DataType, Field, Schema};
use crate::result::{ResultWriter, WriterType};

#[derive(Debug)]
pub struct PositionWriter {
    time_step: Vec<u64>,
    agent_id: Vec<u64>,
    x: Vec<f64>,
    y: Vec<f64>,
    speed_mps: Vec<f32>,
    to_output: WriterType,
}

impl PositionWriter {
    pub fn new(output_file: &PathBuf) -> Self {
        Self {
            to_output: WriterType::new(output_file, Self::schema()),
            time_step: Vec::new(),
            agent_id: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            speed_mps: Vec::new(),
        }
    }

    pub fn add_data(
        &mut self,
        time_ms: TimeMS,
        agent_id: AgentId,
        position: &Point2D,
        speed_mps: f64,
    ) {
        self.time_step.push(time_ms.as_u64());
        self.agent_id.push(agent_id.as_u64());
        self.x.push(position.x);
        self.y.push(position.y);
        self.speed_mps.push(speed_mps as f32);
    }
}

impl ResultWriter for PositionWriter {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("time_step", DataType::UInt64, false),
            Field::new("agent_id", DataType::UInt64, false),
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Float64, false),
            Field::new("speed_mps", DataType::Float32, false),
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
                "x",
                Arc::new(Float64Array::from(std::mem::take(&mut self.x))) as ArrayRef,
            ),
            (
                "y",
                Arc::new(Float64Array::from(std::mem::take(&mut self.y))) as ArrayRef,
            ),
            (
                "speed_mps",
                Arc::new(Float32Array::from(std::mem::take(&mut self.speed_mps))) as ArrayRef,
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
