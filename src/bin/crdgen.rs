use kube::CustomResourceExt;
use l4lb_status::crd::{BackendConfig, ServiceLoadBalancerStatus};

fn main() -> anyhow::Result<()> {
    print!(
        "{}",
        serde_yaml::to_string(&ServiceLoadBalancerStatus::crd())?
    );
    println!("---");
    print!("{}", serde_yaml::to_string(&BackendConfig::crd())?);
    Ok(())
}
