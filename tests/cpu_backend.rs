use array_dispatch::catalog::{self, NDARRAY};
use array_dispatch::error::{DispatchError, EngineError};
use array_dispatch::ops::dispatch;
use array_dispatch::tensors::{Ten64, Tensor};
use array_dispatch::value::{Arg, Value};
use array_dispatch::tensor;
use rand::Rng;

fn ufunc(name: &str) -> &'static array_dispatch::catalog::Ufunc {
    catalog::ufunc(name).unwrap()
}

fn as_tensor(value: &Value) -> &Ten64 {
    value.downcast_ref::<Ten64>().unwrap()
}

#[test]
fn test_elementwise_matches_scalar_kernel() {
    let mut rng = rand::rng();
    let data: Vec<f64> = (0..64).map(|_| rng.random_range(-10.0..10.0)).collect();
    let t = Tensor::new(vec![8, 8], data.clone());

    let args = vec![Arg::value(t), Arg::value(2.0f64)];
    let out = dispatch::ufunc_call(ufunc("multiply"), args).unwrap();
    let out = as_tensor(&out);
    assert_eq!(out.shape, vec![8, 8]);
    for (got, x) in out.data.iter().zip(&data) {
        assert_eq!(*got, x * 2.0);
    }
}

#[test]
fn test_unary_and_comparison() {
    let t = tensor!([1.0, 4.0, 9.0]);
    let roots = dispatch::ufunc_call(ufunc("sqrt"), vec![Arg::value(t.clone())]).unwrap();
    assert_eq!(as_tensor(&roots), &tensor!([1.0, 2.0, 3.0]));

    let args = vec![Arg::value(t), Arg::value(5.0f64)];
    let less = dispatch::ufunc_call(ufunc("less"), args).unwrap();
    assert_eq!(as_tensor(&less), &tensor!([1.0, 1.0, 0.0]));
}

#[test]
fn test_reduce_and_accumulate() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let sums = dispatch::reduce(ufunc("add"), Arg::value(t.clone()), Some(1)).unwrap();
    assert_eq!(as_tensor(&sums), &tensor!([3.0, 7.0]));

    let total = dispatch::reduce(ufunc("add"), Arg::value(tensor!([1.0, 2.0, 3.0])), None).unwrap();
    assert_eq!(total.downcast_ref::<f64>(), Some(&6.0));

    let running = dispatch::accumulate(ufunc("multiply"), Arg::value(t), None).unwrap();
    assert_eq!(as_tensor(&running), &tensor!([[1.0, 2.0], [3.0, 8.0]]));
}

#[test]
fn test_types() {
    assert_eq!(dispatch::types(ufunc("add")).unwrap(), vec!["dd->d"]);
    assert!(matches!(
        dispatch::types(ufunc("gcd")),
        Err(DispatchError::NoImplementation(_))
    ));
}

#[test]
fn test_constructors() {
    let r = dispatch::arange(vec![Arg::value(1.0f64), Arg::value(4.0f64)]).unwrap();
    assert_eq!(as_tensor(&r).data, vec![1.0, 2.0, 3.0]);

    let zeros = dispatch::zeros(vec![2, 2]).unwrap();
    assert_eq!(as_tensor(&zeros), &Tensor::filled(vec![2, 2], 0.0).unwrap());
    assert_eq!(as_tensor(&dispatch::ones(vec![3]).unwrap()), &tensor!([1.0, 1.0, 1.0]));
}

#[test]
fn test_array_and_asarray() {
    let original = Value::new(tensor!([1.0, 2.0]));
    let same = dispatch::asarray(Arg::Value(original.clone())).unwrap();
    assert!(same.ptr_eq(&original));

    let copy = dispatch::array(Arg::Value(original.clone())).unwrap();
    assert!(!copy.ptr_eq(&original));
    assert_eq!(as_tensor(&copy), as_tensor(&original));

    let wrapped = dispatch::asarray(Arg::dispatchable(3.0f64, &NDARRAY)).unwrap();
    assert_eq!(as_tensor(&wrapped), &Tensor::scalar(3.0));
}

#[test]
fn test_large_inputs_use_the_same_kernels() {
    let n = 1 << 16;
    let t = Tensor::new(vec![n], (0..n).map(|i| i as f64).collect());
    let out = dispatch::ufunc_call(ufunc("negative"), vec![Arg::value(t)]).unwrap();
    let out = as_tensor(&out);
    assert_eq!(out.data[0], 0.0);
    assert_eq!(out.data[n - 1], -((n - 1) as f64));
}

#[test]
fn test_oversized_constructors_fail_cleanly() {
    let huge = dispatch::arange(vec![Arg::value(0.0f64), Arg::value(1e300f64)]);
    assert!(matches!(
        huge,
        Err(DispatchError::Engine {
            source: EngineError::InvalidArgument(_),
            ..
        })
    ));

    let overflow = dispatch::zeros(vec![usize::MAX, 2]);
    assert!(matches!(
        overflow,
        Err(DispatchError::Engine {
            source: EngineError::InvalidArgument(_),
            ..
        })
    ));
    assert!(dispatch::ones(vec![usize::MAX]).is_err());
}

#[test]
fn test_inconsistent_tensor_is_an_engine_error() {
    let short = Tensor {
        shape: vec![3],
        data: vec![1.0, 2.0],
    };
    let err = dispatch::accumulate(ufunc("add"), Arg::value(short.clone()), None).unwrap_err();
    assert_eq!(
        err,
        DispatchError::Engine {
            backend: "cpu".into(),
            source: EngineError::InvalidShape {
                shape: vec![3],
                len: 2,
            },
        }
    );
    assert!(dispatch::reduce(ufunc("add"), Arg::value(short.clone()), None).is_err());
    let args = vec![Arg::value(short), Arg::value(tensor!([1.0, 2.0, 3.0]))];
    assert!(dispatch::ufunc_call(ufunc("add"), args).is_err());
}
