use std::path::PathBuf;
use std::sync::Arc;

use dualink_core::agent::AgentId;
use dualink_core::bucket::TimeMS;
use dualink_models::transmission::TransmissionStats;

use crate::arrow::array::{ArrayRef, Float32Array, RecordBatch, UInt32Array, UInt64Array};
use crate::arrow::datatypes::{DataType, Field, Schema};
use crate::result::{ResultWriter, WriterType};

#[derive(Debug)]
pub struct TxDataWriter {
    time_step: Vec<u64>,
    agent_id: Vec<u64>,
    safety_sent: Vec<u32>,
    safety_received: Vec<u32>,
    safety_pdr: Vec<f32>,
    latency_s: Vec<f32>,
    throughput_mbps: Vec<f32>,
    max_throughput_mbps: Vec<f32>,
    to_output: WriterType,
}

impl TxDataWriter {
    pub fn new(output_file: &PathBuf) -> Self {
        Self {
            to_output: WriterType::new(output_file, Self::schema()),
            time_step: Vec::new(),
            agent_id: Vec::new(),
            safety_sent: Vec::new(),
            safety_received: Vec::new(),
            safety_pdr: Vec::new(),
            latency_s: Vec::new(),
            throughput_mbps: Vec::new(),
            max_throughput_mbps: Vec::new(),
        }
    }

    pub fn add_data(&mut self, time_ms: TimeMS, agent_id: AgentId, stats: &TransmissionStats) {
        self.time_step.push(time_ms.as_u64());
        self.agent_id.push(agent_id.as_u64());
        self.safety_sent.push(stats.safety_sent);
        self.safety_received.push(stats.safety_received);
        self.safety_pdr.push(stats.safety_pdr as f32);
        self.latency_s.push(stats.latency.as_f64() as f32);
        self.throughput_mbps.push(stats.throughput.as_f64() as f32);
        self.max_throughput_mbps
            .push(stats.max_throughput.as_f64() as f32);
    }
}

impl ResultWriter for TxDataWriter {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("time_step", DataType::UInt64, false),
            Field::new("agent_id", DataType::UInt64, false),
            Field::new("safety_sent", DataType::UInt32, false),
            Field::new("safety_received", DataType::UInt32, false),
            Field::new("safety_pdr", DataType::Float32, false),
            Field::new("latency_s", DataType::Float32, false),
            Field::new("throughput_mbps", DataType::Float32, false),
            Field::new("max_throughput_mbps", DataType::Float32, false),
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
                "safety_sent",
                Arc::new(UInt32Array::from(std::mem::take(&mut self.safety_sent))) as ArrayRef,
            ),
            (
                "safety_received",
                Arc::new(UInt32Array::from(std::mem::take(&mut self.safety_received))) as ArrayRef,
            ),
            (
                "safety_pdr",
                Arc::new(Float32Array::from(std::mem::take(&mut self.safety_pdr))) as ArrayRef,
            ),
            (
                "latency_s",
                Arc::new(Float32Array::from(std::mem::take(&mut self.latency_s))) as ArrayRef,
            ),
            (
                "throughput_mbps",
                Arc::new(Float32Array::from(std::mem::take(&mut self.throughput_mbps)))
                    as ArrayRef,
            ),
            (
                "max_throughput_mbps",
                Arc::new(Float32Array::from(std::mem::take(
                    &mut self.max_throughput_mbps,
                ))) as ArrayRef,
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
