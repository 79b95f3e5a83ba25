use std::sync::Arc;

use layforge_core::{
    CellId, CellSpec, Direction, InstanceConnectivity, Layer, Layout, LayoutResult, RefKey,
    SchematicCell,
};
use layforge_route::{DesignRules, RouteRequest, Router, ViaDefinition};
use layforge_verify::{check_shorts, verify};

fn li1() -> Layer {
    Layer::conductor("LI1")
}

fn met1() -> Layer {
    Layer::conductor("MET1")
}

fn rules() -> DesignRules {
    let mut rules = DesignRules::new("demo");
    rules
        .add_routing_layer(li1(), 170, 170)
        .add_routing_layer(met1(), 140, 140);
    rules.add_via(ViaDefinition {
        name: "MCON".into(),
        bottom_layer: li1(),
        cut_layer: Layer::conductor("MCON"),
        top_layer: met1(),
        cut_w: 170,
        cut_h: 170,
        cut_spacing: 190,
        bottom_enc: 0,
        bottom_enc_adjacent: 0,
        top_enc: 30,
        top_enc_adjacent: 60,
    });
    rules
}

/// Three LI1 terminal pads, S/G/D from left to right.
fn draw_fet(layout: &mut Layout, id: CellId) -> LayoutResult<()> {
    for (i, terminal) in ["S", "G", "D"].into_iter().enumerate() {
        let x = 400 * i as i64;
        let pad = layout.add_rect(id, li1(), x, 0, x + 200, 200, Some(&terminal.to_lowercase()));
        layout.add_pin(id, terminal, pad)?;
    }
    Ok(())
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_inverter_routes_clean() {
    init_logger();
    let rules = rules();
    let router = Router::new(&rules);

    let mut sch = SchematicCell::new("Inverter");
    for (name, rail) in [("MN", "vss"), ("MP", "vdd")] {
        sch.add_instance(
            InstanceConnectivity::new(name)
                .connect("D", "out")
                .connect("G", "in")
                .connect("S", rail),
        );
    }
    let mut layout = Layout::new("inv");
    let top = layout
        .create(CellSpec::new("Inverter").connectivity(Arc::new(sch)))
        .unwrap();
    let mn = layout.create(CellSpec::new("Fet").instance("MN").parent(top)).unwrap();
    let mp = layout.create(CellSpec::new("Fet").instance("MP").parent(top)).unwrap();
    draw_fet(&mut layout, mn).unwrap();
    draw_fet(&mut layout, mp).unwrap();
    layout.align(mp, Direction::Above, mn, 600, true).unwrap();

    for terminal in ["D", "G"] {
        let request = RouteRequest::new(RefKey::new(mn, terminal), RefKey::new(mp, terminal), met1())
            .how("|")
            .unwrap();
        router.route(&mut layout, top, &request).unwrap();
    }
    layout.add_pin(top, "vss", RefKey::new(mn, "S")).unwrap();
    layout.add_pin(top, "vdd", RefKey::new(mp, "S")).unwrap();

    let flat = layout.flatten(top, true);
    assert!(flat
        .iter()
        .filter(|s| s.source.as_deref() == Some("Inverter.MP"))
        .all(|s| matches!(s.net.as_deref(), Some("vdd" | "in" | "out"))));

    let report = verify(&layout, top);
    assert!(report.passed(), "{report}");
    assert_eq!(report.connectivity.required, 6);

    layout.add_rect(top, met1(), 850, 400, 1200, 500, Some("vdd"));
    let shorts = check_shorts(&layout, top);
    assert_eq!(shorts.len(), 1);
    let short = &shorts.shorts[0];
    assert_eq!(short.layer, met1());
    let mut nets = [short.net_a.as_str(), short.net_b.as_str()];
    nets.sort();
    assert_eq!(nets, ["out", "vdd"]);
}

#[test]
fn test_replicated_mirror_needs_external_connection() {
    init_logger();
    let rules = rules();
    let router = Router::new(&rules);

    let mut sch = SchematicCell::new("Mirror");
    sch.add_instance(
        InstanceConnectivity::new("MREF")
            .connect("D", "bias")
            .connect("G", "bias")
            .connect("S", "vss"),
    );
    sch.add_instance(
        InstanceConnectivity::new("MOUT")
            .with_replicas(2)
            .connect("D", "out")
            .connect("G", "bias")
            .connect("S", "vss"),
    );
    let mut layout = Layout::new("mirror");
    let top = layout
        .create(CellSpec::new("Mirror").connectivity(Arc::new(sch)))
        .unwrap();
    let mref = layout.create(CellSpec::new("Fet").instance("MREF").parent(top)).unwrap();
    draw_fet(&mut layout, mref).unwrap();
    let mout = layout.instantiate(top, "MOUT", |_| CellSpec::new("Fet")).unwrap();
    assert_eq!(mout.len(), 2);
    mout.for_each(|_, &id| draw_fet(&mut layout, id)).unwrap();
    assert_eq!(layout.cell(mout[1]).instance_name(), "MOUT_1");
    layout
        .stack(&[mref, mout[0], mout[1]], Direction::Right, 300)
        .unwrap();

    // Shared source rail.
    assert_eq!(layout.check_off_net(top, "vss"), 4);

    let route = |layout: &mut Layout, a: RefKey, b: RefKey, how: &str, track: f64| {
        let request = RouteRequest::new(a, b, met1()).how(how).unwrap().track(track);
        router.route(layout, top, &request).unwrap()
    };
    let gate = route(&mut layout, RefKey::new(mref, "G"), RefKey::new(mout[0], "G"), "-|", -1.0);
    assert_eq!(gate.waypoints[1].y, -210);
    assert_eq!(gate.net.as_deref(), Some("bias"));
    route(&mut layout, RefKey::new(mout[0], "G"), RefKey::new(mout[1], "G"), "-|", -1.0);
    route(&mut layout, RefKey::new(mref, "D"), RefKey::new(mref, "G"), "-", 0.0);
    route(&mut layout, RefKey::new(mout[0], "D"), RefKey::new(mout[1], "D"), "-|", 1.0);

    let missing = layout.check_connectivity(top);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].to_string(), "MOUT.d -> out");

    layout.add_pin(top, "out", RefKey::new(mout[1], "D")).unwrap();
    let report = verify(&layout, top);
    assert!(report.passed(), "{report}");
    assert_eq!(report.connectivity.required, 12);
}
