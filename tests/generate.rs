//! Integration tests driving `dbus_stub_gen::generate` end-to-end over
//! whole introspection documents: signature correctness, struct naming/
//! deduplication, the `NoReply`/`Async` precedence, array element typing,
//! and property access-flag gating.

use pretty_assertions::assert_eq;

fn generate(xml: &str, prefix: &str) -> dbus_stub_gen::node::GeneratedNode {
    dbus_stub_gen::generate(xml.as_bytes(), prefix, &[]).expect("valid introspection document")
}

#[test]
fn simple_method_round_trips_through_object_and_proxy() {
    let xml = r#"
        <node>
          <interface name="com.example.Calculator">
            <method name="Add">
              <arg name="a" type="i" direction="in"/>
              <arg name="b" type="i" direction="in"/>
              <arg name="result" type="i" direction="out"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "calc");

    assert!(gen.object_source.contains("calc_com_example_calculator_add"));
    assert!(gen.object_source.contains("int32_t"));
    assert!(gen.proxy_source.contains("calc_com_example_calculator_add_sync"));
    assert!(gen.proxy_source.contains("result_output"));
}

#[test]
fn struct_typed_argument_generates_one_struct_definition() {
    let xml = r#"
        <node>
          <interface name="com.example.Store">
            <method name="Lookup">
              <arg name="key" type="s" direction="in"/>
              <arg name="entry" type="(su)" direction="out"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "store");

    assert!(gen.struct_decls.contains("typedef struct"));
    let occurrences = gen.struct_decls.matches("typedef struct").count();
    assert_eq!(occurrences, 1, "a single struct-typed argument should emit exactly one struct definition");
}

#[test]
fn array_of_struct_element_type_is_a_pointer_to_the_struct() {
    let xml = r#"
        <node>
          <interface name="com.example.Store">
            <method name="ListAll">
              <arg name="entries" type="a(su)" direction="out"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "store");

    // The array's element is a struct, so the array variable itself must be
    // declared as a pointer-to-struct-pointer (an array of struct pointers),
    // not a flat array of the struct type.
    assert!(gen.object_source.contains("**"), "array-of-struct should be emitted as a pointer array");
}

#[test]
fn method_with_output_and_no_reply_annotation_demotes_no_reply() {
    let xml = r#"
        <node>
          <interface name="com.example.Foo">
            <method name="Weird">
              <arg name="result" type="s" direction="out"/>
              <annotation name="org.freedesktop.DBus.Method.NoReply" value="true"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "foo");

    // NoReply should have been cleared (the method has output), so the
    // object function must still construct and send a reply.
    assert!(gen.object_source.contains("dbus_message_new_method_return"));
}

#[test]
fn no_reply_method_without_output_skips_reply_construction() {
    let xml = r#"
        <node>
          <interface name="com.example.Foo">
            <method name="FireAndForget">
              <arg name="payload" type="s" direction="in"/>
              <annotation name="org.freedesktop.DBus.Method.NoReply" value="true"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "foo");

    assert!(gen.object_source.contains("foo_com_example_foo_fire_and_forget"));
    assert!(!gen.object_source.contains("dbus_message_new_method_return"));
}

#[test]
fn async_method_emits_separate_reply_function_and_proxy_notify() {
    let xml = r#"
        <node>
          <interface name="com.example.Foo">
            <method name="SlowOp">
              <arg name="result" type="s" direction="out"/>
              <annotation name="org.freedesktop.DBus.Method.Async" value="true"/>
            </method>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "foo");

    assert!(gen.object_source.contains("foo_com_example_foo_slow_op_reply"));
    assert!(gen.proxy_source.contains("foo_com_example_foo_slow_op_notify"));
}

#[test]
fn read_only_property_has_no_object_set_function() {
    let xml = r#"
        <node>
          <interface name="com.example.Thermostat">
            <property name="Temperature" type="d" access="read"/>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "therm");

    assert!(gen.object_source.contains("therm_com_example_thermostat_get_temperature"));
    assert!(!gen.object_source.contains("therm_com_example_thermostat_set_temperature"));
}

#[test]
fn signal_filter_function_is_generated_for_proxies() {
    let xml = r#"
        <node>
          <interface name="com.example.Thermostat">
            <signal name="TemperatureChanged">
              <arg name="value" type="d"/>
            </signal>
          </interface>
        </node>
    "#;
    let gen = generate(xml, "therm");

    assert!(gen.object_source.contains("therm_com_example_thermostat_temperature_changed_emit"));
    assert!(gen.proxy_source.contains("therm_com_example_thermostat_temperature_changed_signal"));
}

#[test]
fn interface_filter_restricts_output_to_named_interfaces() {
    let xml = r#"
        <node>
          <interface name="com.example.Foo"><method name="Ping"/></interface>
          <interface name="com.example.Bar"><method name="Pong"/></interface>
        </node>
    "#;
    let gen = dbus_stub_gen::generate(xml.as_bytes(), "my", &["com.example.Bar".to_owned()]).unwrap();

    assert!(!gen.object_source.contains("com_example_foo"));
    assert!(gen.object_source.contains("com_example_bar"));
}
