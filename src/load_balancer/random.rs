//! Uniform random load balancing strategy.

use rand::Rng;
use crate::discovery::ServiceInstance;
use crate::load_balancer::LoadBalancer;

#[derive(Debug, Default)]
pub struct Random;

impl LoadBalancer for Random {
    fn choose<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..instances.len());
        instances.get(index)
    }
}
