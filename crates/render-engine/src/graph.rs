//! Typed filter graph.
//!
//! A [`FilterGraph`] is an ordered list of [`FilterNode`]s wired through pad
//! labels, plus the media inputs it reads. Pads are handed out as move-only
//! [`VideoPad`] / [`AudioPad`] handles by a [`GraphBuilder`]; a stage takes
//! its input pad by value and returns a fresh one, so every intermediate
//! pad is consumed exactly once by construction.
//! [`FilterGraph::validate`] re-checks that invariant on the finished data.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use reelcut_common::{ReelcutError, ReelcutResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// Reference to a stream: either an input file's stream or a node output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum PadRef {
    Source { input: usize, kind: StreamKind },
    Link { label: String, kind: StreamKind },
}

impl PadRef {
    pub fn kind(&self) -> StreamKind {
        match self {
            PadRef::Source { kind, .. } | PadRef::Link { kind, .. } => *kind,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            PadRef::Link { label, .. } => Some(label),
            PadRef::Source { .. } => None,
        }
    }
}

impl fmt::Display for PadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadRef::Source { input, kind } => write!(f, "[{input}:{}]", kind.specifier()),
            PadRef::Link { label, .. } => write!(f, "[{label}]"),
        }
    }
}

mod sealed {
    pub trait Sealed {
        fn wrap(pad: super::PadRef) -> Self;
    }
}

/// A typed pad handle. Only [`GraphBuilder`] can create one.
pub trait Pad: sealed::Sealed + fmt::Debug {
    const KIND: StreamKind;

    fn pad_ref(&self) -> &PadRef;

    fn into_ref(self) -> PadRef;
}

/// Video stream handle.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unconsumed pad leaves a dangling graph output"]
pub struct VideoPad(PadRef);

/// Audio stream handle.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unconsumed pad leaves a dangling graph output"]
pub struct AudioPad(PadRef);

impl sealed::Sealed for VideoPad {
    fn wrap(pad: PadRef) -> Self {
        VideoPad(pad)
    }
}

impl sealed::Sealed for AudioPad {
    fn wrap(pad: PadRef) -> Self {
        AudioPad(pad)
    }
}

impl Pad for VideoPad {
    const KIND: StreamKind = StreamKind::Video;

    fn pad_ref(&self) -> &PadRef {
        &self.0
    }

    fn into_ref(self) -> PadRef {
        self.0
    }
}

impl Pad for AudioPad {
    const KIND: StreamKind = StreamKind::Audio;

    fn pad_ref(&self) -> &PadRef {
        &self.0
    }

    fn into_ref(self) -> PadRef {
        self.0
    }
}

/// One filter inside a node's chain, e.g. `scale=1080:1920`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub name: String,
    pub args: Option<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    pub fn with_args(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Some(args.into()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args {
            Some(args) => write!(f, "{}={args}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Which compiler stage emitted a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Frame,
    Tempo,
    Motion,
    Overlay,
    Color,
    Subtitle,
    Watermark,
    Primary,
    Enhance,
    Music,
    Mix,
    Sfx,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Frame => "frame",
            Stage::Tempo => "tempo",
            Stage::Motion => "motion",
            Stage::Overlay => "overlay",
            Stage::Color => "color",
            Stage::Subtitle => "subtitle",
            Stage::Watermark => "watermark",
            Stage::Primary => "primary",
            Stage::Enhance => "enhance",
            Stage::Music => "music",
            Stage::Mix => "mix",
            Stage::Sfx => "sfx",
        }
    }
}

/// A filter chain with labeled inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterNode {
    pub id: usize,
    pub stage: Stage,
    pub filters: Vec<Filter>,
    pub inputs: Vec<PadRef>,
    pub outputs: Vec<PadRef>,
}

impl FilterNode {
    /// Whether any filter in the chain has the given name.
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name == name)
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "{input}")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for output in &self.outputs {
            write!(f, "{output}")?;
        }
        Ok(())
    }
}

/// A media file read by the program, with its pre-`-i` options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaInput {
    pub path: PathBuf,
    pub options: Vec<String>,
}

fn secs(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

impl MediaInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: Vec::new(),
        }
    }

    /// Input seeked to `start_ms` and limited to `duration_ms`.
    pub fn trimmed(path: impl Into<PathBuf>, start_ms: u64, duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            options: vec!["-ss".into(), secs(start_ms), "-t".into(), secs(duration_ms)],
        }
    }

    /// Still image repeated as a video stream for `duration_ms`.
    pub fn looped_image(path: impl Into<PathBuf>, duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            options: vec!["-loop".into(), "1".into(), "-t".into(), secs(duration_ms)],
        }
    }

    /// Audio file looped forever, starting at `offset_ms`.
    pub fn looped_audio(path: impl Into<PathBuf>, offset_ms: u64) -> Self {
        Self {
            path: path.into(),
            options: vec![
                "-stream_loop".into(),
                "-1".into(),
                "-ss".into(),
                secs(offset_ms),
            ],
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        args.extend(self.options.iter().cloned());
        args.push("-i".into());
        args.push(self.path.to_string_lossy().into_owned());
    }
}

/// A compiled graph: inputs, nodes in emission order, and terminal pads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    /// Input 0 is always the trimmed source.
    pub inputs: Vec<MediaInput>,
    pub nodes: Vec<FilterNode>,
    pub video_out: Option<PadRef>,
    pub audio_out: Option<PadRef>,
}

impl FilterGraph {
    /// Nodes emitted by `stage`, in order.
    pub fn stage_nodes(&self, stage: Stage) -> impl Iterator<Item = &FilterNode> {
        self.nodes.iter().filter(move |node| node.stage == stage)
    }

    /// `-filter_complex` program text.
    pub fn to_filter_complex(&self) -> String {
        self.nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Check the wiring invariant.
    ///
    /// Every node input is a declared source or an earlier node's output,
    /// every pad is consumed at most once, every non-terminal output is
    /// consumed, and terminal pads exist and are unconsumed.
    pub fn validate(&self) -> ReelcutResult<()> {
        let mut produced: HashMap<&str, StreamKind> = HashMap::new();
        let mut consumed: HashSet<&str> = HashSet::new();
        let mut sources: HashSet<(usize, StreamKind)> = HashSet::new();

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id != index {
                return Err(graph_error(format!(
                    "node at position {index} has id {}",
                    node.id
                )));
            }
            if node.filters.is_empty() {
                return Err(graph_error(format!("node {index} has no filters")));
            }
            for input in &node.inputs {
                match input {
                    PadRef::Source { input, kind } => {
                        if *input >= self.inputs.len() {
                            return Err(graph_error(format!(
                                "node {index} reads undeclared input {input}"
                            )));
                        }
                        if !sources.insert((*input, *kind)) {
                            return Err(graph_error(format!(
                                "source pad [{input}:{}] consumed twice",
                                kind.specifier()
                            )));
                        }
                    }
                    PadRef::Link { label, kind } => {
                        match produced.get(label.as_str()) {
                            Some(found) if found == kind => {}
                            Some(_) => {
                                return Err(graph_error(format!(
                                    "node {index} reads [{label}] as the wrong stream kind"
                                )))
                            }
                            None => {
                                return Err(graph_error(format!(
                                    "node {index} reads [{label}] before any node produces it"
                                )))
                            }
                        }
                        if !consumed.insert(label.as_str()) {
                            return Err(graph_error(format!("pad [{label}] consumed twice")));
                        }
                    }
                }
            }
            for output in &node.outputs {
                match output {
                    PadRef::Link { label, kind } => {
                        if produced.insert(label.as_str(), *kind).is_some() {
                            return Err(graph_error(format!("pad [{label}] declared twice")));
                        }
                    }
                    PadRef::Source { .. } => {
                        return Err(graph_error(format!(
                            "node {index} declares a source pad as output"
                        )))
                    }
                }
            }
        }

        if self.video_out.is_none() && self.audio_out.is_none() {
            return Err(graph_error("graph has no terminal pad"));
        }

        let mut terminals: HashSet<&str> = HashSet::new();
        for (terminal, expected) in [
            (&self.video_out, StreamKind::Video),
            (&self.audio_out, StreamKind::Audio),
        ] {
            let Some(pad) = terminal else { continue };
            if pad.kind() != expected {
                return Err(graph_error(format!("terminal {pad} has the wrong stream kind")));
            }
            match pad {
                PadRef::Link { label, .. } => {
                    if !produced.contains_key(label.as_str()) {
                        return Err(graph_error(format!("terminal [{label}] is dangling")));
                    }
                    if consumed.contains(label.as_str()) {
                        return Err(graph_error(format!(
                            "terminal [{label}] is also consumed by a node"
                        )));
                    }
                    terminals.insert(label.as_str());
                }
                PadRef::Source { input, kind } => {
                    if *input >= self.inputs.len() || sources.contains(&(*input, *kind)) {
                        return Err(graph_error(format!("terminal {pad} is unavailable")));
                    }
                }
            }
        }

        let mut unconnected: Vec<&str> = produced
            .keys()
            .filter(|label| !consumed.contains(*label) && !terminals.contains(*label))
            .copied()
            .collect();
        if !unconnected.is_empty() {
            unconnected.sort_unstable();
            return Err(graph_error(format!(
                "unconnected outputs: {}",
                unconnected.join(", ")
            )));
        }

        Ok(())
    }
}

fn graph_error(message: impl Into<String>) -> ReelcutError {
    ReelcutError::graph(format!("Invalid filter graph: {}", message.into()))
}

/// Incrementally builds a [`FilterGraph`].
#[derive(Debug)]
pub struct GraphBuilder {
    inputs: Vec<MediaInput>,
    nodes: Vec<FilterNode>,
    next_video: usize,
    next_audio: usize,
    taken_sources: HashSet<(usize, StreamKind)>,
}

impl GraphBuilder {
    /// Start a graph whose input 0 is `source`.
    pub fn new(source: MediaInput) -> Self {
        Self {
            inputs: vec![source],
            nodes: Vec::new(),
            next_video: 0,
            next_audio: 0,
            taken_sources: HashSet::new(),
        }
    }

    /// Declare an additional input and return its index.
    pub fn add_input(&mut self, input: MediaInput) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    /// Take the stream of kind `P` from input `input`. Each source stream
    /// can be taken once.
    pub fn source<P: Pad>(&mut self, input: usize) -> ReelcutResult<P> {
        if input >= self.inputs.len() {
            return Err(graph_error(format!("input {input} is not declared")));
        }
        if !self.taken_sources.insert((input, P::KIND)) {
            return Err(graph_error(format!(
                "source [{input}:{}] already taken",
                P::KIND.specifier()
            )));
        }
        Ok(<P as sealed::Sealed>::wrap(PadRef::Source {
            input,
            kind: P::KIND,
        }))
    }

    /// Emit a node with one output.
    pub fn node<P: Pad>(&mut self, stage: Stage, inputs: Vec<P>, filters: Vec<Filter>) -> P {
        let output = self.fresh(P::KIND);
        self.push(stage, inputs, filters, vec![output.clone()]);
        <P as sealed::Sealed>::wrap(output)
    }

    /// Emit a node with `outputs` outputs (e.g. `split`, `asplit`).
    pub fn fan_out<P: Pad>(
        &mut self,
        stage: Stage,
        inputs: Vec<P>,
        filters: Vec<Filter>,
        outputs: usize,
    ) -> Vec<P> {
        let refs: Vec<PadRef> = (0..outputs).map(|_| self.fresh(P::KIND)).collect();
        self.push(stage, inputs, filters, refs.clone());
        refs.into_iter()
            .map(<P as sealed::Sealed>::wrap)
            .collect()
    }

    /// Emit a node without inputs (e.g. `anullsrc`).
    pub fn generator<P: Pad>(&mut self, stage: Stage, filters: Vec<Filter>) -> P {
        self.node(stage, Vec::new(), filters)
    }

    pub fn finish(self, video: Option<VideoPad>, audio: Option<AudioPad>) -> FilterGraph {
        FilterGraph {
            inputs: self.inputs,
            nodes: self.nodes,
            video_out: video.map(Pad::into_ref),
            audio_out: audio.map(Pad::into_ref),
        }
    }

    fn fresh(&mut self, kind: StreamKind) -> PadRef {
        let counter = match kind {
            StreamKind::Video => &mut self.next_video,
            StreamKind::Audio => &mut self.next_audio,
        };
        let label = format!("{}{}", kind.specifier(), *counter);
        *counter += 1;
        PadRef::Link { label, kind }
    }

    fn push<P: Pad>(
        &mut self,
        stage: Stage,
        inputs: Vec<P>,
        filters: Vec<Filter>,
        outputs: Vec<PadRef>,
    ) {
        let id = self.nodes.len();
        self.nodes.push(FilterNode {
            id,
            stage,
            filters,
            inputs: inputs.into_iter().map(Pad::into_ref).collect(),
            outputs,
        });
    }
}

/// Video and audio graphs merged into one encoder program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderProgram {
    pub graph: FilterGraph,
    pub duration_ms: u64,
}

impl RenderProgram {
    /// Merge two graphs that share input 0. The audio graph's extra inputs
    /// are renumbered after the video graph's.
    pub fn merge(video: FilterGraph, audio: FilterGraph, duration_ms: u64) -> ReelcutResult<Self> {
        if video.inputs.first() != audio.inputs.first() {
            return Err(graph_error("video and audio graphs read different sources"));
        }
        let offset = video.inputs.len().saturating_sub(1);
        let base_id = video.nodes.len();

        let mut graph = video;
        graph.inputs.extend(audio.inputs.into_iter().skip(1));
        for mut node in audio.nodes {
            node.id += base_id;
            for input in node.inputs.iter_mut() {
                if let PadRef::Source { input: index, .. } = input {
                    if *index > 0 {
                        *index += offset;
                    }
                }
            }
            graph.nodes.push(node);
        }
        graph.audio_out = audio.audio_out;
        graph.validate()?;

        Ok(Self { graph, duration_ms })
    }

    /// Full encoder argument list.
    pub fn ffmpeg_args(&self, codec_args: &[String], output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-y",
            "-loglevel",
            "error",
            "-progress",
            "pipe:1",
            "-nostats",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        for input in &self.graph.inputs {
            input.push_args(&mut args);
        }

        args.push("-filter_complex".into());
        args.push(self.graph.to_filter_complex());
        for terminal in [&self.graph.video_out, &self.graph.audio_out]
            .into_iter()
            .flatten()
        {
            args.push("-map".into());
            args.push(terminal.to_string());
        }
        args.extend(codec_args.iter().cloned());
        args.push("-t".into());
        args.push(secs(self.duration_ms));
        args.push(output.to_string_lossy().into_owned());
        args
    }
}
