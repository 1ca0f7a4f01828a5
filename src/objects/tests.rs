use super::*;
use crate::core::Closure;
use crate::errors::PyErrKind;

#[derive(Clone, Debug, PartialEq)]
struct Account {
    balance: i64,
    owner: String,
}

fn account_class(module: &ModuleRef) -> Class<Account> {
    let class = wrap_class::<Account>(&**module, "Account");
    class
        .define_property(
            "balance",
            Property::new(|a: &Account| Ok(a.balance.into_py())).with_setter(
                |a: &mut Account, value: &PyObject| {
                    a.balance = i64::from_py(value)?;
                    Ok(())
                },
            ),
        )
        .define_property("owner", Property::new(|a: &Account| Ok(a.owner.clone().into_py())))
        .define_method(
            "deposit",
            PyFunction::new("deposit", |args: &[PyObject]| {
                let (account, amount) = <(Instance<Account>, i64)>::from_py_args(args)?;
                let mut guard = account.lock();
                guard.balance += amount;
                Ok(PyObject::Int(guard.balance))
            }),
        );
    class
}

#[test]
fn test_int_range_checks() {
    assert_eq!(u8::from_py(&PyObject::Int(255)).unwrap(), 255);
    let err = u8::from_py(&PyObject::Int(256)).unwrap_err();
    assert!(matches!(err, BindError::IntegerOverflow { target: "u8", .. }));
    assert!(i32::from_py(&PyObject::Str("1".into())).is_err());
    assert_eq!(i16::from_py(&PyObject::Bool(true)).unwrap(), 1);
}

#[test]
fn test_large_unsigned_becomes_float() {
    assert_eq!(u64::MAX.into_py().get_type(), ObjectType::Float);
    assert_eq!(7u64.into_py(), PyObject::Int(7));
}

#[test]
fn test_vec_from_list_or_tuple() {
    let list = PyObject::List(vec![PyObject::Int(1), PyObject::Int(2)]);
    let tuple = PyObject::tuple([PyObject::Int(3)]);
    assert_eq!(Vec::<i32>::from_py(&list).unwrap(), vec![1, 2]);
    assert_eq!(Vec::<i32>::from_py(&tuple).unwrap(), vec![3]);
}

#[test]
fn test_null_pointer_is_none() {
    assert_eq!(std::ptr::null_mut::<u8>().into_py(), PyObject::None);
    let ptr = <*const u8>::from_py(&PyObject::None).unwrap();
    assert!(ptr.is_null());
}

#[test]
fn test_return_shapes() {
    assert_eq!((5i32,).into_py_return(), PyObject::Int(5));
    assert_eq!(((), 4i32).into_py_return(), PyObject::Int(4));
    assert_eq!(
        ((), 1i32, 2i32).into_py_return(),
        PyObject::tuple([PyObject::Int(1), PyObject::Int(2)])
    );
    assert_eq!(
        (true, 2i32).into_py_return(),
        PyObject::tuple([PyObject::Bool(true), PyObject::Int(2)])
    );
    assert_eq!(((),).into_py_return(), PyObject::None);
}

#[test]
fn test_argument_errors_name_position() {
    let args = [PyObject::Int(1), PyObject::Str("x".into())];
    let err = <(i32, i32)>::from_py_args(&args).unwrap_err();
    assert!(matches!(err, BindError::Argument { index: 1, .. }));

    let err = <(i32,)>::from_py_args(&args).unwrap_err();
    assert_eq!(err, BindError::ArgCount { expected: 1, got: 2 });
}

#[test]
fn test_module_attributes() {
    let root = ModuleObject::root("bank");
    let sub = ModuleObject::child(&*root, "ext");
    assert_eq!(root.member_name("f"), "::f");
    assert_eq!(sub.member_name("g"), "::ext::g");

    let object = PyObject::Module(root.clone());
    object.setattr("VERSION", PyObject::Int(2)).unwrap();
    assert_eq!(object.getattr("VERSION").unwrap(), PyObject::Int(2));
    assert!(matches!(
        object.getattr("missing"),
        Err(BindError::Attribute { .. })
    ));
    assert!(matches!(
        PyObject::Int(1).setattr("x", PyObject::None),
        Err(BindError::NotANamespace { .. })
    ));
}

#[test]
fn test_instance_properties_and_methods() {
    let root = ModuleObject::root("bank");
    let class = account_class(&root);
    assert_eq!(class.class().qualified_name(), "::Account");

    let account = class.instantiate(Account {
        balance: 10,
        owner: "ada".into(),
    });
    assert_eq!(account.type_name(), "Account");
    assert_eq!(account.getattr("owner").unwrap(), PyObject::str("ada"));

    account.setattr("balance", PyObject::Int(50)).unwrap();
    assert_eq!(account.call_method("deposit", &[PyObject::Int(5)]).unwrap(), PyObject::Int(55));
    assert_eq!(account.getattr("balance").unwrap(), PyObject::Int(55));

    let err = account.setattr("owner", PyObject::str("bob")).unwrap_err();
    assert_eq!(err, BindError::ReadOnly { attr: "owner".into() });

    // unknown attributes land in the instance dictionary
    account.setattr("note", PyObject::str("vip")).unwrap();
    assert_eq!(account.getattr("note").unwrap(), PyObject::str("vip"));
    assert_eq!(class.class().is_writable("balance"), Some(true));
    assert_eq!(class.class().property_names(), vec!["balance", "owner"]);
}

#[test]
fn test_instance_handle_round_trip() {
    let root = ModuleObject::root("bank");
    account_class(&root);
    let handle = Instance::new(Account {
        balance: 1,
        owner: "x".into(),
    });
    let object = handle.clone().into_object();
    let back = Instance::<Account>::from_py(&object).unwrap();
    assert!(back.ptr_eq(&handle));
    assert!(Instance::<String>::from_py(&object).is_err());
}

#[test]
fn test_closure_from_function() {
    let function = PyFunction::new("add", |args: &[PyObject]| {
        let (a, b) = <(i64, i64)>::from_py_args(args)?;
        Ok(PyObject::Int(a + b))
    });
    let closure = Closure::<(i32, i32), i64>::from_py(&PyObject::Function(function)).unwrap();
    assert_eq!(closure.call((2, 3)), Ok(5));

    let back = closure.into_py();
    assert_eq!(back.call(&[PyObject::Int(1), PyObject::Int(1)]).unwrap(), PyObject::Int(2));
}

#[test]
fn test_call_non_callable() {
    let err = PyObject::Int(3).call(&[]).unwrap_err();
    assert_eq!(err.kind, PyErrKind::TypeError);
}
