/// Step of a reading in progress, carried by transient failures so the log
/// says where the sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SelectCurrent,
    SettleCurrent,
    MeasureCurrent,
    SelectVoltage,
    SettleVoltage,
    MeasureVoltage,
    MeasurePower,
    Integrate,
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// Pin used twice in one config, or already held by another driver
    PinConflict(i32),
    InvalidPin(i32),
    IsrService,
    PinConfig(i32),
    HandlerInstall(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    Init(InitError),
    InvalidArgument,
    TransientRead(Stage),
}

pub type SensorResult<T> = Result<T, SensorError>;

impl From<InitError> for SensorError {
    fn from(err: InitError) -> Self {
        SensorError::Init(err)
    }
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InitError::PinConflict(pin) => write!(f, "GPIO{} already claimed", pin),
            InitError::InvalidPin(pin) => write!(f, "GPIO{} is not usable for this role", pin),
            InitError::IsrService => write!(f, "GPIO ISR service install failed"),
            InitError::PinConfig(pin) => write!(f, "GPIO{} configuration failed", pin),
            InitError::HandlerInstall(pin) => write!(f, "GPIO{} edge handler install failed", pin),
        }
    }
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SensorError::Init(err) => write!(f, "Init error: {}", err),
            SensorError::InvalidArgument => write!(f, "Invalid argument"),
            SensorError::TransientRead(stage) => write!(f, "Read failed during {:?}", stage),
        }
    }
}

impl std::error::Error for InitError {}
impl std::error::Error for SensorError {}
