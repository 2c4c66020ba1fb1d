pub mod modules;

pub use modules::activation::Activation;
pub use modules::config::{self, RunConfig, load_config, save_config};
pub use modules::demo::{self, Walker, WalkerModel};
pub use modules::error::{SimError, SimResult};
pub use modules::model::{GridModel, Model, ModelParams};
pub use modules::params::{
    Checkbox, Choice, ModelParam, NumberInput, ParamRegistry, Slider, StaticText, UserParam,
};
pub use modules::portrayal::{CanvasGrid, GridState, Portrayal, render_grid};
pub use modules::space::{CoordIter, MultiGrid, Neighborhood, Position};
pub use modules::time::{
    AdvanceContext, Agent, AgentId, Scheduler, SchedulerState, StepContext,
};
pub use modules::value::{Number, Scalar};
pub use modules::visualization::{
    ClientMessage, DEFAULT_ELEMENT_TEXT, ServerMessage, TextElement, Visualization,
    VisualizationElement, render_model,
};
