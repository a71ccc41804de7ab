use simulation::run_delivery_simulation;
pub mod simulation;

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run_delivery_simulation());
}
