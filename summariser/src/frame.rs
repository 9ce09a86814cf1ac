use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read run file {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Run file {file} is not a valid run record: {source}")]
    Corrupt {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Run file {file} has {found} frames, at least {required} are required")]
    TooFewFrames {
        file: String,
        found: usize,
        required: usize,
    },

    #[error("Frame {frame} of {file} has no `{field}` at index {index}")]
    MissingField {
        file: String,
        frame: usize,
        field: FrameField,
        index: usize,
    },

    #[error("Field `{field}` in frame {frame} of {file} has unexpected value {value}")]
    UnexpectedValue {
        file: String,
        frame: usize,
        field: FrameField,
        value: Value,
    },

    #[error("Final frame counter of {file} is {value}, cannot normalise totals by it")]
    InvalidFrameCounter { file: String, value: f64 },

    #[error("Unknown frame field `{0}`")]
    UnknownField(String),
}

/// The telemetry fields of a simulator frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameField {
    Frame,
    RunningReqs,
    Nodes,
    ReqDoneTimeAvg,
    ReqDoneTimeStd,
    ReqDoneTimeAvg90p,
    Cost,
    Score,
    DoneReqCount,
    ReqWaitScheTime,
    ReqWaitColdstartTime,
    ReqDataRecvTime,
    ReqExeTime,
    AlgoExeTime,
    FncontainerCount,
}

impl FrameField {
    pub const ALL: [FrameField; 15] = [
        FrameField::Frame,
        FrameField::RunningReqs,
        FrameField::Nodes,
        FrameField::ReqDoneTimeAvg,
        FrameField::ReqDoneTimeStd,
        FrameField::ReqDoneTimeAvg90p,
        FrameField::Cost,
        FrameField::Score,
        FrameField::DoneReqCount,
        FrameField::ReqWaitScheTime,
        FrameField::ReqWaitColdstartTime,
        FrameField::ReqDataRecvTime,
        FrameField::ReqExeTime,
        FrameField::AlgoExeTime,
        FrameField::FncontainerCount,
    ];

    /// Name used in settings files, the lower case form of the simulator constant suffix.
    pub fn name(self) -> &'static str {
        match self {
            FrameField::Frame => "frame",
            FrameField::RunningReqs => "running_reqs",
            FrameField::Nodes => "nodes",
            FrameField::ReqDoneTimeAvg => "req_done_time_avg",
            FrameField::ReqDoneTimeStd => "req_done_time_std",
            FrameField::ReqDoneTimeAvg90p => "req_done_time_avg_90p",
            FrameField::Cost => "cost",
            FrameField::Score => "score",
            FrameField::DoneReqCount => "done_req_count",
            FrameField::ReqWaitScheTime => "req_wait_sche_time",
            FrameField::ReqWaitColdstartTime => "req_wait_coldstart_time",
            FrameField::ReqDataRecvTime => "req_data_recv_time",
            FrameField::ReqExeTime => "req_exe_time",
            FrameField::AlgoExeTime => "algo_exe_time",
            FrameField::FncontainerCount => "fncontainer_count",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FrameField::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl Display for FrameField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where each field sits in a frame array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    indices: BTreeMap<FrameField, usize>,
}

impl Default for FrameLayout {
    /// The simulator's current frame table.
    fn default() -> Self {
        Self {
            indices: FrameField::ALL
                .into_iter()
                .enumerate()
                .map(|(index, field)| (field, index))
                .collect(),
        }
    }
}

impl FrameLayout {
    pub fn index(&self, field: FrameField) -> usize {
        // Every layout is built from the default table, so all fields are present.
        self.indices.get(&field).copied().unwrap_or_default()
    }

    /// Read indices from the simulator's `metric.rs`, starting from the default table.
    ///
    /// Lines of the form `const FRAME_IDX_<NAME>: usize = <n>;` are used, everything else is
    /// ignored. Constants for fields this crate does not know are skipped.
    pub fn from_metric_source(source: &str) -> Self {
        let mut layout = Self::default();
        for line in source.lines() {
            let Some(rest) = line
                .trim()
                .trim_start_matches("pub ")
                .strip_prefix("const FRAME_IDX_")
            else {
                continue;
            };
            let Some((name, value)) = rest.split_once(':') else {
                continue;
            };
            let Some(index) = value
                .split_once('=')
                .map(|(_, n)| n.trim().trim_end_matches(';').trim())
                .and_then(|n| n.parse::<usize>().ok())
            else {
                log::debug!("Skipping unparseable frame index line: {line}");
                continue;
            };

            match FrameField::from_name(&name.trim().to_lowercase()) {
                Some(field) => {
                    layout.indices.insert(field, index);
                }
                None => log::debug!("Ignoring unknown frame index {name}"),
            }
        }
        layout
    }

    /// Apply per field overrides, keyed by [FrameField::name].
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, usize>) -> Result<Self, LoadError> {
        for (name, index) in overrides {
            let field =
                FrameField::from_name(name).ok_or_else(|| LoadError::UnknownField(name.clone()))?;
            self.indices.insert(field, *index);
        }
        Ok(self)
    }
}

/// Typed access to one frame of a run file.
pub(crate) struct FrameView<'a> {
    pub(crate) file: &'a str,
    pub(crate) frame: usize,
    pub(crate) values: &'a [Value],
    pub(crate) layout: &'a FrameLayout,
}

impl FrameView<'_> {
    fn value(&self, field: FrameField) -> Result<&Value, LoadError> {
        let index = self.layout.index(field);
        self.values.get(index).ok_or_else(|| LoadError::MissingField {
            file: self.file.to_string(),
            frame: self.frame,
            field,
            index,
        })
    }

    pub(crate) fn number(&self, field: FrameField) -> Result<f64, LoadError> {
        let value = self.value(field)?;
        value.as_f64().ok_or_else(|| LoadError::UnexpectedValue {
            file: self.file.to_string(),
            frame: self.frame,
            field,
            value: value.clone(),
        })
    }

    pub(crate) fn list_len(&self, field: FrameField) -> Result<usize, LoadError> {
        let value = self.value(field)?;
        value
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| LoadError::UnexpectedValue {
                file: self.file.to_string(),
                frame: self.frame,
                field,
                value: value.clone(),
            })
    }
}
