use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::csv::Writer;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatchWriter;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Deserialize;

use dualink_core::bucket::TimeMS;

use crate::tables::handover::HandoverWriter;
use crate::tables::position::PositionWriter;
use crate::tables::reward::RewardWriter;
use crate::tables::tx::TxDataWriter;

#[derive(Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputType {
    TxStats,
    HandoverStats,
    Rewards,
    AgentPos,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputSettings {
    pub output_interval: TimeMS,
    pub output_path: String,
    pub scenario_id: u32,
    pub outputs: Vec<Outputs>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Outputs {
    pub output_type: OutputType,
    pub output_filename: String,
}

pub trait ResultWriter {
    fn schema() -> Schema;
    fn write_to_file(&mut self);
    fn close_file(self);
}

#[derive(Debug)]
pub enum WriterType {
    Parquet(WriterParquet),
    Csv(WriterCsv),
}

impl WriterType {
    pub fn new(file_name: &PathBuf, schema: Schema) -> Self {
        if file_name.exists() {
            match std::fs::remove_file(file_name) {
                Ok(_) => {}
                Err(e) => panic!("Error deleting file: {}", e),
            }
        }
        match file_name.extension() {
            Some(ext) => match ext.to_str() {
                Some("parquet") => WriterType::Parquet(WriterParquet::new(file_name, schema)),
                Some("csv") => WriterType::Csv(WriterCsv::new(file_name)),
                _ => panic!("Invalid file extension"),
            },
            None => panic!("Invalid file extension"),
        }
    }
}

#[derive(Debug)]
pub struct WriterParquet {
    pub writer: ArrowWriter<File>,
}

impl WriterParquet {
    fn new(file_name: &PathBuf, schema: Schema) -> Self {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let output_file = match File::create(file_name) {
            Ok(file) => file,
            Err(_) => panic!("Failed to create output file to write"),
        };
        let writer = match ArrowWriter::try_new(output_file, SchemaRef::from(schema), Some(props)) {
            Ok(writer) => writer,
            Err(_) => panic!("Failed to create the output file writer"),
        };
        Self { writer }
    }

    pub fn close(self) {
        self.writer.close().expect("Failed to close parquet file");
    }
}

#[derive(Debug)]
pub struct WriterCsv {
    pub writer: Writer<File>,
}

impl WriterCsv {
    fn new(file_name: &PathBuf) -> Self {
        let writer = Writer::new(File::create(file_name).expect("failed to create file"));
        Self { writer }
    }

    pub fn close(self) {
        self.writer.close().expect("failed to close csv file");
    }
}

/// The per-step flat-record sinks of the simulation. Each configured table
/// gets its own writer; unconfigured tables stay off.
#[derive(Debug)]
pub struct Results {
    pub tx_data: Option<TxDataWriter>,
    pub handovers: Option<HandoverWriter>,
    pub rewards: Option<RewardWriter>,
    pub positions: Option<PositionWriter>,
}

impl Results {
    pub fn new(output_settings: &OutputSettings) -> Self {
        let output_path = Path::new(&output_settings.output_path)
            .join(output_settings.scenario_id.to_string())
            .join("files");
        if !output_path.exists() {
            fs::create_dir_all(&output_path).expect("Failed to create output directory");
        }

        let tx_data = output_settings
            .outputs
            .iter()
            .filter(|output| output.output_type == OutputType::TxStats)
            .last()
            .map(|settings| TxDataWriter::new(&output_path.join(&settings.output_filename)));
        let handovers = output_settings
            .outputs
            .iter()
            .filter(|output| output.output_type == OutputType::HandoverStats)
            .last()
            .map(|settings| HandoverWriter::new(&output_path.join(&settings.output_filename)));
        let rewards = output_settings
            .outputs
            .iter()
            .filter(|output| output.output_type == OutputType::Rewards)
            .last()
            .map(|settings| RewardWriter::new(&output_path.join(&settings.output_filename)));
        let positions = output_settings
            .outputs
            .iter()
            .filter(|output| output.output_type == OutputType::AgentPos)
            .last()
            .map(|settings| PositionWriter::new(&output_path.join(&settings.output_filename)));
        Self {
            tx_data,
            handovers,
            rewards,
            positions,
        }
    }

    pub fn write_to_file(&mut self) {
        if let Some(writer) = &mut self.tx_data {
            writer.write_to_file();
        }
        if let Some(writer) = &mut self.handovers {
            writer.write_to_file();
        }
        if let Some(writer) = &mut self.rewards {
            writer.write_to_file();
        }
        if let Some(writer) = &mut self.positions {
            writer.write_to_file();
        }
    }

    pub fn close_files(self) {
        if let Some(writer) = self.tx_data {
            writer.close_file();
        }
        if let Some(writer) = self.handovers {
            writer.close_file();
        }
        if let Some(writer) = self.rewards {
            writer.close_file();
        }
        if let Some(writer) = self.positions {
            writer.close_file();
        }
    }
}
