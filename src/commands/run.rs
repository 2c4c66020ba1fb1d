use gridsim::{ClientMessage, Model, RunConfig, ServerMessage, demo};
use tracing::info;

pub(super) fn run_simulation(cfg: &RunConfig, every: bool) -> Result<(), String> {
    let mut viz = demo::demo_visualization(&cfg.overrides()).map_err(|e| e.to_string())?;
    info!(
        name = viz.name(),
        description = viz.description(),
        steps = cfg.steps,
        agents = viz.model().schedule().len(),
        "run started"
    );

    let mut last = viz.viz_state();
    if every {
        print_message(&last)?;
    }

    for step in 1..=cfg.steps {
        let replies = viz
            .handle_message(ClientMessage::GetStep { step })
            .map_err(|e| e.to_string())?;
        let mut ended = false;
        for reply in replies {
            if every {
                print_message(&reply)?;
            }
            match reply {
                ServerMessage::End => ended = true,
                frame => last = frame,
            }
        }
        if ended {
            info!(step, "model stopped running");
            break;
        }
    }

    if !every {
        print_message(&last)?;
    }
    info!(ticks = viz.model().steps(), "run finished");
    Ok(())
}

fn print_message(message: &ServerMessage) -> Result<(), String> {
    let json = serde_json::to_string(message).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
