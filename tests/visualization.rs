use gridsim::{
    AdvanceContext, Agent, AgentId, CanvasGrid, ClientMessage, DEFAULT_ELEMENT_TEXT, GridModel,
    Model, ModelParams, ParamRegistry, Portrayal, Position, ServerMessage, SimResult,
    StepContext, TextElement, UserParam, Visualization, VisualizationElement, render_grid,
};
use serde_json::json;

#[derive(Debug)]
struct MockAgent {
    id: AgentId,
    val: i64,
}

impl Agent for MockAgent {
    type Staged = i64;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&self, _ctx: &StepContext<'_, Self>) -> SimResult<i64> {
        Ok(self.val + 1)
    }

    fn advance(&mut self, staged: i64, _ctx: &mut AdvanceContext<'_>) -> SimResult<()> {
        self.val = staged;
        Ok(())
    }
}

type MockModel = GridModel<MockAgent>;

fn mock_model(params: &ModelParams) -> SimResult<MockModel> {
    let mut model = GridModel::from_params(params.clone())?;
    model.populate(|pos, _| {
        Some(MockAgent {
            id: (pos.x + pos.y * 100) as AgentId,
            val: (pos.x * pos.y * 3) as i64,
        })
    })?;
    Ok(model)
}

fn portrayal(_agent: &MockAgent) -> Option<Portrayal> {
    Some(Portrayal::rect(1, 1, "black"))
}

fn registry() -> ParamRegistry {
    ParamRegistry::new()
        .with("width", 1)
        .with("height", 1)
        .with("key1", UserParam::number_input("Test Parameter", 101).unwrap())
        .with(
            "key2",
            UserParam::slider("Test Parameter", 200, 0, 300, 10).unwrap(),
        )
}

fn visualization() -> Visualization<MockModel> {
    let elements: Vec<Box<dyn VisualizationElement<MockModel>>> = vec![
        Box::new(CanvasGrid::new(portrayal, 10, 10, 20, 20)),
        Box::new(TextElement::<MockModel>::placeholder()),
    ];
    Visualization::new("Test Model", mock_model, elements, registry()).unwrap()
}

#[test]
fn render_after_one_step() {
    let mut viz = visualization();
    assert!(viz.step().unwrap());

    let state = viz.render_model();
    assert_eq!(
        state[0],
        json!({
            "0": [{
                "Shape": "rect",
                "w": 1,
                "h": 1,
                "Filled": "true",
                "Layer": 0,
                "x": 0,
                "y": 0,
                "Color": "black",
            }]
        })
    );
    assert_eq!(state[1], json!(DEFAULT_ELEMENT_TEXT));
    assert_eq!(viz.model().agent(0).unwrap().val, 1);
}

#[test]
fn user_params_json() {
    let viz = visualization();
    let params = serde_json::to_value(viz.user_params()).unwrap();
    assert_eq!(
        params,
        json!({
            "key1": {"type": "number_input", "label": "Test Parameter", "value": 101},
            "key2": {
                "type": "slider",
                "label": "Test Parameter",
                "value": 200,
                "min_value": 0,
                "max_value": 300,
                "step": 10,
            },
        })
    );
}

#[test]
fn model_receives_fixed_and_user_values() {
    let viz = visualization();
    let params = viz.model().params();
    assert_eq!(params.i64_or("key1", 0).unwrap(), 101);
    assert_eq!(params.i64_or("key2", 0).unwrap(), 200);
    assert_eq!(params.usize_or("width", 0).unwrap(), 1);
}

#[test]
fn rendering_twice_without_stepping_is_identical() {
    let mut viz = visualization();
    viz.step().unwrap();
    assert_eq!(viz.render_model(), viz.render_model());
}

#[test]
fn shared_cell_renders_in_placement_order() {
    let params = ModelParams::new().with("width", 3).with("height", 3);
    let mut model: MockModel = GridModel::from_params(params).unwrap();
    model
        .add_agent(MockAgent { id: 42, val: 0 }, Position::new(1, 2))
        .unwrap();
    model
        .add_agent(MockAgent { id: 7, val: 0 }, Position::new(1, 2))
        .unwrap();

    let state = render_grid(&model, |agent| {
        Some(Portrayal::circle(0.5, "red").with("id", agent.id as i64))
    });
    let ids: Vec<_> = state
        .layer(0)
        .iter()
        .map(|p| p.get("id").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(ids, vec![42, 7]);
}

#[test]
fn coord_order_drives_population() {
    let params = ModelParams::new().with("width", 2).with("height", 3);
    let model = mock_model(&params).unwrap();
    assert_eq!(model.schedule().agent_ids(), &[0, 100, 200, 1, 101, 201]);
    assert_eq!(model.agent(201).unwrap().val, 6);
}

#[test]
fn client_session_round() {
    let mut viz = visualization();

    let reply = viz.handle_message(ClientMessage::GetStep { step: 1 }).unwrap();
    assert!(matches!(reply.as_slice(), [ServerMessage::VizState { data }] if data.len() == 2));

    viz.handle_message(ClientMessage::SubmitParams {
        param: "key2".into(),
        value: 1000.into(),
    })
    .unwrap();
    let reply = viz.handle_message(ClientMessage::GetParams).unwrap();
    let [ServerMessage::ModelParams { params }] = reply.as_slice() else {
        panic!("unexpected reply {:?}", reply);
    };
    assert_eq!(params["key2"]["value"], json!(300));

    viz.handle_message(ClientMessage::Reset).unwrap();
    assert_eq!(viz.model().steps(), 0);
    assert_eq!(viz.model().params().i64_or("key2", 0).unwrap(), 300);

    let wire = serde_json::to_value(viz.viz_state()).unwrap();
    assert_eq!(wire["type"], json!("viz_state"));
    assert_eq!(wire["data"][1], json!(DEFAULT_ELEMENT_TEXT));
}
