use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use infragraph_core::Tag;
use infragraph_graph::{link, Discovered, Instance, Placement, SecurityGroup, Subnet, Vpc};
use std::hint::black_box;

/// A region of `vpcs` VPCs, each with four subnets, 25 instances per subnet
/// and one security group per subnet.
fn synthetic_region(vpcs: usize) -> Discovered {
    let mut d = Discovered::default();
    for v in 0..vpcs {
        let vpc_id = format!("vpc-{v:04}");
        d.vpcs.insert(
            vpc_id.clone(),
            Vpc {
                vpc_id: vpc_id.clone(),
                cidr_block: format!("10.{v}.0.0/16"),
                tags: vec![Tag::new("Name", format!("Network {v}"))],
                ..Default::default()
            },
        );
        for s in 0..4 {
            let subnet_id = format!("subnet-{v:04}-{s}");
            let group_id = format!("sg-{v:04}-{s}");
            d.subnets.insert(
                subnet_id.clone(),
                Subnet {
                    subnet_id: subnet_id.clone(),
                    vpc_id: vpc_id.clone(),
                    availability_zone: format!("us-east-1{}", ['a', 'b'][s % 2]),
                    cidr_block: format!("10.{v}.{s}.0/24"),
                    ..Default::default()
                },
            );
            d.security_groups.insert(
                group_id.clone(),
                SecurityGroup {
                    group_id: group_id.clone(),
                    group_name: format!("tier-{s}"),
                    vpc_id: Some(vpc_id.clone()),
                    ..Default::default()
                },
            );
            for i in 0..25 {
                let instance_id = format!("i-{v:04}{s}{i:03}");
                d.instances.insert(
                    instance_id.clone(),
                    Instance {
                        instance_id,
                        vpc_id: Some(vpc_id.clone()),
                        subnet_id: Some(subnet_id.clone()),
                        security_group_ids: vec![group_id.clone()],
                        placement: Placement {
                            availability_zone: format!("us-east-1{}", ['a', 'b'][s % 2]),
                            tenancy: "default".into(),
                        },
                        tags: vec![Tag::new("Name", format!("Worker {i}"))],
                        ..Default::default()
                    },
                );
            }
        }
    }
    d
}

fn bench_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("link");
    for vpcs in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(vpcs), &vpcs, |b, &vpcs| {
            b.iter_batched(
                || synthetic_region(vpcs),
                |d| black_box(link(d, 1)),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_link);
criterion_main!(benches);
